use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;

use crate::domain::{AgentHost, MetricKind, MetricSample};
use crate::ports::MetricStore;

/// In-memory ring buffers of recent samples, one per (agent, metric)
pub struct MemoryStore {
    windows: RwLock<HashMap<(AgentHost, MetricKind), VecDeque<MetricSample>>>,
    max_size: usize,
}

impl MemoryStore {
    pub fn new(max_size: usize) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            max_size: max_size.max(1),
        }
    }
}

impl MetricStore for MemoryStore {
    fn record(&self, host: &AgentHost, sample: MetricSample) {
        let mut windows = self.windows.write();
        let window = windows
            .entry((host.clone(), sample.kind()))
            .or_insert_with(|| VecDeque::with_capacity(self.max_size));

        if window.len() >= self.max_size {
            window.pop_front();
        }

        window.push_back(sample);
    }

    fn history(&self, host: &AgentHost, kind: MetricKind, window: Duration) -> Vec<MetricSample> {
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or_default();

        self.windows
            .read()
            .get(&(host.clone(), kind))
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.time_at() >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
