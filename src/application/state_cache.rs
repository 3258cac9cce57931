use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::{
    counter_delta, counter_rate, AgentHost, CounterWidth, DashboardSummary, HostSnapshot,
    InterfaceReading, InterfaceRecord, TrafficSample, TrapEvent, TrapNotice, UptimeSample,
};

/// Result of one poll cycle, as handed to the cache
#[derive(Debug, Clone)]
pub struct PollUpdate {
    pub host: AgentHost,
    /// Cycle start time
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: Option<u64>,
    pub interfaces: Vec<InterfaceReading>,
}

/// What an applied poll update produced for the live streams
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    /// False when the update was older than the last applied poll
    pub accepted: bool,
    pub uptime: Option<UptimeSample>,
    pub traffic: Option<TrafficSample>,
    /// Operational status transitions detected between polls
    pub status_changes: Vec<TrapNotice>,
}

#[derive(Debug, Clone, Copy)]
struct CounterReading {
    in_octets: u64,
    out_octets: u64,
    at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct HostState {
    interfaces: BTreeMap<u32, InterfaceRecord>,
    summary: DashboardSummary,
    /// Previous raw octet counters per ifIndex
    counters: HashMap<u32, CounterReading>,
    uptime_seconds: Option<u64>,
    last_poll_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    stale: bool,
}

impl HostState {
    fn refresh_summary(&mut self) {
        self.summary = DashboardSummary::from_records(self.interfaces.values());
    }

    fn snapshot(&self, host: &AgentHost) -> HostSnapshot {
        HostSnapshot {
            host: host.clone(),
            summary: self.summary,
            interfaces: self.interfaces.values().cloned().collect(),
            uptime_seconds: self.uptime_seconds,
            last_polled_at: self.last_poll_at,
            stale: self.stale,
        }
    }

    /// Aggregate traffic rate across interfaces, rolling the stored counters forward
    fn roll_counters(
        &mut self,
        host: &AgentHost,
        readings: &[InterfaceReading],
        at: DateTime<Utc>,
        width: CounterWidth,
    ) -> Option<TrafficSample> {
        let mut in_rate = 0.0;
        let mut out_rate = 0.0;
        let mut valid = 0usize;
        let mut next = HashMap::with_capacity(readings.len());

        for reading in readings {
            let (Some(in_octets), Some(out_octets)) = (reading.in_octets, reading.out_octets) else {
                continue;
            };
            let current = CounterReading {
                in_octets,
                out_octets,
                at,
            };

            if let Some(previous) = self.counters.get(&reading.index) {
                let elapsed = (at - previous.at).to_std().unwrap_or_default();
                let rates = counter_delta(previous.in_octets, in_octets, width)
                    .and_then(|d| counter_rate(d, elapsed))
                    .zip(
                        counter_delta(previous.out_octets, out_octets, width)
                            .and_then(|d| counter_rate(d, elapsed)),
                    );
                match rates {
                    Some((rx, tx)) => {
                        in_rate += rx;
                        out_rate += tx;
                        valid += 1;
                    }
                    None => debug!(
                        host = %host,
                        interface = %reading.name,
                        "Discarding implausible counter sample"
                    ),
                }
            }

            next.insert(reading.index, current);
        }

        self.counters = next;
        (valid > 0).then(|| TrafficSample::new(at, in_rate, out_rate))
    }
}

/// Latest known state per agent.
///
/// All writers go through `apply` / `apply_trap` / `record_failure`; the
/// summary is recomputed under the same write lock as the interface set, so
/// `snapshot` never observes one without the other.
pub struct StateCache {
    hosts: RwLock<HashMap<AgentHost, HostState>>,
    counter_width: CounterWidth,
}

impl StateCache {
    pub fn new(counter_width: CounterWidth) -> Self {
        Self {
            hosts: RwLock::new(HashMap::new()),
            counter_width,
        }
    }

    /// Apply a poll result: last-write-wins per ifIndex, except that an
    /// operational status observed later (by a trap) is kept.
    pub fn apply(&self, update: PollUpdate) -> ApplyOutcome {
        let mut hosts = self.hosts.write();
        let state = hosts.entry(update.host.clone()).or_default();

        if let Some(last) = state.last_poll_at {
            if update.timestamp < last {
                debug!(host = %update.host, "Ignoring poll update older than the cached state");
                return ApplyOutcome::default();
            }
        }

        // agent restart resets every counter
        if let (Some(previous), Some(current)) = (state.uptime_seconds, update.uptime_seconds) {
            if current < previous {
                debug!(host = %update.host, "Agent restarted, rebaselining counters");
                state.counters.clear();
            }
        }

        let mut outcome = ApplyOutcome {
            accepted: true,
            ..ApplyOutcome::default()
        };

        let mut previous = std::mem::take(&mut state.interfaces);
        for reading in &update.interfaces {
            let mut record = InterfaceRecord::from_reading(reading, update.timestamp);
            if let Some(old) = previous.remove(&reading.index) {
                if old.oper_status_at > update.timestamp {
                    record.oper_status = old.oper_status;
                    record.oper_status_at = old.oper_status_at;
                } else if old.oper_status != record.oper_status {
                    outcome.status_changes.push(TrapNotice {
                        interface_name: record.name.clone(),
                        interface_index: record.index,
                        interface_status: record.oper_status,
                    });
                }
            }
            state.interfaces.insert(reading.index, record);
        }
        for gone in previous.values() {
            debug!(host = %update.host, interface = %gone.name, "Interface no longer reported");
        }

        state.refresh_summary();
        outcome.traffic =
            state.roll_counters(&update.host, &update.interfaces, update.timestamp, self.counter_width);
        outcome.uptime = update
            .uptime_seconds
            .map(|uptime| UptimeSample::new(update.timestamp, uptime));

        state.uptime_seconds = update.uptime_seconds.or(state.uptime_seconds);
        state.last_poll_at = Some(update.timestamp);
        state.consecutive_failures = 0;
        state.stale = false;

        outcome
    }

    /// Apply a trap to the interface with the event's name.
    ///
    /// Returns the notice to stream, or None when the interface is unknown or
    /// the cache already holds a later status observation.
    pub fn apply_trap(&self, host: &AgentHost, event: &TrapEvent) -> Option<TrapNotice> {
        let mut hosts = self.hosts.write();
        let state = hosts.get_mut(host)?;
        let record = state
            .interfaces
            .values_mut()
            .find(|r| r.name == event.interface_name)?;

        if event.timestamp < record.oper_status_at {
            debug!(host = %host, interface = %event.interface_name, "Ignoring trap older than cached status");
            return None;
        }

        record.oper_status = event.status;
        record.oper_status_at = event.timestamp;
        record.updated_at = event.timestamp;
        let notice = TrapNotice {
            interface_name: record.name.clone(),
            interface_index: record.index,
            interface_status: record.oper_status,
        };

        state.refresh_summary();
        Some(notice)
    }

    /// Count a failed poll cycle; returns true when this failure made the host stale
    pub fn record_failure(&self, host: &AgentHost, stale_after: u32) -> bool {
        let mut hosts = self.hosts.write();
        let state = hosts.entry(host.clone()).or_default();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        let became_stale = !state.stale && state.consecutive_failures >= stale_after.max(1);
        if became_stale {
            state.stale = true;
        }
        became_stale
    }

    /// Consistent view of one host, None until it has been polled or has failed once
    pub fn snapshot(&self, host: &AgentHost) -> Option<HostSnapshot> {
        self.hosts.read().get(host).map(|state| state.snapshot(host))
    }

    /// True once at least one poll of the host succeeded
    pub fn has_data(&self, host: &AgentHost) -> bool {
        self.hosts
            .read()
            .get(host)
            .is_some_and(|state| state.last_poll_at.is_some())
    }

    pub fn interface_name(&self, host: &AgentHost, index: u32) -> Option<String> {
        self.hosts
            .read()
            .get(host)
            .and_then(|state| state.interfaces.get(&index))
            .map(|record| record.name.clone())
    }

    pub fn contains_interface(&self, host: &AgentHost, index: u32) -> bool {
        self.hosts
            .read()
            .get(host)
            .is_some_and(|state| state.interfaces.contains_key(&index))
    }
}
