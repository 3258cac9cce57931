use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::debug;

use crate::domain::{
    AgentHost, MetricKind, MetricSample, TimeRange, TrafficSample, TrapNotice, UptimeSample,
};
use crate::ports::MetricStore;

/// Subscriber queue length used when none is configured
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Item pushed to live subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Uptime(UptimeSample),
    Traffic(TrafficSample),
    Trap(TrapNotice),
}

impl StreamEvent {
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Uptime(_) => MetricKind::Uptime,
            Self::Traffic(_) => MetricKind::Traffic,
            Self::Trap(_) => MetricKind::Traps,
        }
    }

    fn as_sample(&self) -> Option<MetricSample> {
        match self {
            Self::Uptime(s) => Some(MetricSample::Uptime(s.clone())),
            Self::Traffic(s) => Some(MetricSample::Traffic(s.clone())),
            Self::Trap(_) => None,
        }
    }
}

impl From<MetricSample> for StreamEvent {
    fn from(sample: MetricSample) -> Self {
        match sample {
            MetricSample::Uptime(s) => Self::Uptime(s),
            MetricSample::Traffic(s) => Self::Traffic(s),
        }
    }
}

/// One delivered item, with the number of items dropped right before it
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub event: StreamEvent,
    pub missed: u64,
}

struct SubscriberQueue {
    id: u64,
    capacity: usize,
    items: Mutex<VecDeque<StreamEvent>>,
    missed: AtomicU64,
    closed: AtomicBool,
    notify: Notify,
}

impl SubscriberQueue {
    fn new(id: u64, capacity: usize) -> Self {
        Self {
            id,
            capacity: capacity.max(1),
            items: Mutex::new(VecDeque::new()),
            missed: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Never waits: a full queue loses its oldest item instead
    fn push(&self, event: StreamEvent) {
        {
            let mut items = self.items.lock();
            while items.len() >= self.capacity {
                items.pop_front();
                self.missed.fetch_add(1, Ordering::Relaxed);
            }
            items.push_back(event);
        }
        self.notify.notify_one();
    }

    /// Replace the pending items with `seed`, forgetting any drop count
    fn reset(&self, seed: impl IntoIterator<Item = StreamEvent>) {
        {
            let mut items = self.items.lock();
            items.clear();
            items.extend(seed);
            self.missed.store(0, Ordering::Relaxed);
        }
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Delivery> {
        let event = self.items.lock().pop_front()?;
        let missed = self.missed.swap(0, Ordering::Relaxed);
        Some(Delivery { event, missed })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

type SubscriberKey = (AgentHost, MetricKind);

/// Fans published samples and trap notices out to live subscribers
pub struct MetricStreamer {
    store: Arc<dyn MetricStore>,
    subscribers: RwLock<HashMap<SubscriberKey, Vec<Arc<SubscriberQueue>>>>,
    queue_capacity: usize,
    next_id: AtomicU64,
}

impl MetricStreamer {
    pub fn new(store: Arc<dyn MetricStore>, queue_capacity: usize) -> Self {
        Self {
            store,
            subscribers: RwLock::new(HashMap::new()),
            queue_capacity,
            next_id: AtomicU64::new(1),
        }
    }

    /// Record the event in the recent window and push it to matching subscribers.
    ///
    /// Recording and fan-out happen under one registry read lock, so a
    /// concurrent subscribe sees the sample either in its seed or live, never both.
    pub fn publish(&self, host: &AgentHost, event: StreamEvent) {
        let subscribers = self.subscribers.read();

        if let Some(sample) = event.as_sample() {
            self.store.record(host, sample);
        }

        if let Some(queues) = subscribers.get(&(host.clone(), event.kind())) {
            for queue in queues {
                queue.push(event.clone());
            }
        }
    }

    /// Open a subscription seeded with the retained samples inside `range`
    pub fn subscribe(self: &Arc<Self>, host: AgentHost, kind: MetricKind, range: TimeRange) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(SubscriberQueue::new(id, self.queue_capacity));

        {
            let mut subscribers = self.subscribers.write();
            queue.reset(self.retained(&host, kind, range));
            subscribers
                .entry((host.clone(), kind))
                .or_default()
                .push(Arc::clone(&queue));
        }
        debug!(host = %host, kind = %kind, id, "Subscriber added");

        Subscription {
            streamer: Arc::downgrade(self),
            host,
            kind,
            range,
            queue,
        }
    }

    pub fn subscriber_count(&self, host: &AgentHost, kind: MetricKind) -> usize {
        self.subscribers
            .read()
            .get(&(host.clone(), kind))
            .map_or(0, Vec::len)
    }

    /// End every open subscription; pending items are still delivered
    pub fn close_all(&self) {
        let mut subscribers = self.subscribers.write();
        for queue in subscribers.values().flatten() {
            queue.close();
        }
        subscribers.clear();
    }

    /// Samples in the window, newest last; the queue capacity bounds the seed
    fn retained(&self, host: &AgentHost, kind: MetricKind, range: TimeRange) -> Vec<StreamEvent> {
        if kind == MetricKind::Traps {
            return Vec::new();
        }
        let mut events: Vec<StreamEvent> = self
            .store
            .history(host, kind, range.duration())
            .into_iter()
            .map(StreamEvent::from)
            .collect();
        let excess = events.len().saturating_sub(self.queue_capacity.max(1));
        events.drain(..excess);
        events
    }

    fn reseed(&self, subscription: &Subscription) {
        let _subscribers = self.subscribers.write();
        subscription
            .queue
            .reset(self.retained(&subscription.host, subscription.kind, subscription.range));
    }

    fn unsubscribe(&self, host: &AgentHost, kind: MetricKind, id: u64) {
        let mut subscribers = self.subscribers.write();
        let key = (host.clone(), kind);
        if let Some(queues) = subscribers.get_mut(&key) {
            queues.retain(|q| q.id != id);
            if queues.is_empty() {
                subscribers.remove(&key);
            }
        }
    }
}

/// A live stream of one metric kind for one agent; unregisters on drop
pub struct Subscription {
    streamer: Weak<MetricStreamer>,
    host: AgentHost,
    kind: MetricKind,
    range: TimeRange,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    pub fn host(&self) -> &AgentHost {
        &self.host
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn time_range(&self) -> TimeRange {
        self.range
    }

    /// Next item in arrival order; None once the streamer closed the subscription
    pub async fn recv(&self) -> Option<Delivery> {
        loop {
            if let Some(delivery) = self.queue.pop() {
                return Some(delivery);
            }
            if self.queue.closed.load(Ordering::Acquire) {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Non-waiting variant of `recv`
    #[cfg(test)]
    pub fn try_recv(&self) -> Option<Delivery> {
        self.queue.pop()
    }

    /// Switch the time range: pending items are discarded and the queue is
    /// reseeded with retained samples inside the new range
    pub fn set_time_range(&mut self, range: TimeRange) {
        self.range = range;
        match self.streamer.upgrade() {
            Some(streamer) => streamer.reseed(self),
            None => self.queue.reset(Vec::new()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(streamer) = self.streamer.upgrade() {
            streamer.unsubscribe(&self.host, self.kind, self.queue.id);
            debug!(host = %self.host, kind = %self.kind, id = self.queue.id, "Subscriber removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::InterfaceStatus;

    fn host() -> AgentHost {
        AgentHost::new("10.0.0.1")
    }

    fn streamer(capacity: usize) -> Arc<MetricStreamer> {
        Arc::new(MetricStreamer::new(Arc::new(MemoryStore::new(100)), capacity))
    }

    fn uptime(ago_secs: i64, value: u64) -> StreamEvent {
        let at: DateTime<Utc> = Utc::now() - chrono::Duration::seconds(ago_secs);
        StreamEvent::Uptime(UptimeSample::new(at, value))
    }

    fn value_of(delivery: &Delivery) -> u64 {
        match &delivery.event {
            StreamEvent::Uptime(s) => s.uptime,
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delivers_in_arrival_order() {
        let streamer = streamer(8);
        let sub = streamer.subscribe(host(), MetricKind::Uptime, TimeRange::FiveMinutes);

        for v in 1..=3 {
            streamer.publish(&host(), uptime(0, v));
        }

        for expected in 1..=3 {
            let delivery = sub.recv().await.unwrap();
            assert_eq!(value_of(&delivery), expected);
            assert_eq!(delivery.missed, 0);
        }
    }

    #[tokio::test]
    async fn test_routes_by_host_and_kind() {
        let streamer = streamer(8);
        let traps = streamer.subscribe(host(), MetricKind::Traps, TimeRange::default());
        let other = streamer.subscribe(AgentHost::new("10.0.0.2"), MetricKind::Uptime, TimeRange::default());

        streamer.publish(&host(), uptime(0, 1));
        let notice = TrapNotice {
            interface_name: "eth0".to_string(),
            interface_index: 1,
            interface_status: InterfaceStatus::Down,
        };
        streamer.publish(&host(), StreamEvent::Trap(notice.clone()));

        assert_eq!(traps.recv().await.unwrap().event, StreamEvent::Trap(notice));
        assert!(traps.try_recv().is_none());
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_drops_oldest_without_blocking() {
        let streamer = streamer(3);
        let slow = streamer.subscribe(host(), MetricKind::Uptime, TimeRange::FiveMinutes);
        let fast = streamer.subscribe(host(), MetricKind::Uptime, TimeRange::FiveMinutes);

        let mut fast_seen = Vec::new();
        for v in 1..=10 {
            streamer.publish(&host(), uptime(0, v));
            fast_seen.push(value_of(&fast.recv().await.unwrap()));
        }
        assert_eq!(fast_seen, (1..=10).collect::<Vec<_>>());

        let first = slow.recv().await.unwrap();
        assert_eq!(value_of(&first), 8);
        assert_eq!(first.missed, 7);
        assert_eq!(value_of(&slow.recv().await.unwrap()), 9);
        let last = slow.recv().await.unwrap();
        assert_eq!(value_of(&last), 10);
        assert_eq!(last.missed, 0);
    }

    #[tokio::test]
    async fn test_subscribe_seeds_retained_window() {
        let streamer = streamer(8);
        streamer.publish(&host(), uptime(600, 1));
        streamer.publish(&host(), uptime(30, 2));

        let sub = streamer.subscribe(host(), MetricKind::Uptime, TimeRange::OneMinute);
        assert_eq!(value_of(&sub.recv().await.unwrap()), 2);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_time_range_change_reseeds() {
        let streamer = streamer(8);
        streamer.publish(&host(), uptime(600, 1));
        streamer.publish(&host(), uptime(30, 2));

        let mut sub = streamer.subscribe(host(), MetricKind::Uptime, TimeRange::OneMinute);
        sub.set_time_range(TimeRange::OneHour);
        assert_eq!(sub.time_range(), TimeRange::OneHour);

        assert_eq!(value_of(&sub.recv().await.unwrap()), 1);
        assert_eq!(value_of(&sub.recv().await.unwrap()), 2);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let streamer = streamer(8);
        let sub = streamer.subscribe(host(), MetricKind::Traffic, TimeRange::default());
        assert_eq!(streamer.subscriber_count(&host(), MetricKind::Traffic), 1);

        drop(sub);
        assert_eq!(streamer.subscriber_count(&host(), MetricKind::Traffic), 0);
    }

    #[tokio::test]
    async fn test_close_all_ends_waiting_receivers() {
        let streamer = streamer(8);
        let sub = streamer.subscribe(host(), MetricKind::Uptime, TimeRange::default());

        let waiter = tokio::spawn(async move { sub.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        streamer.close_all();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(result.is_none());
    }
}
