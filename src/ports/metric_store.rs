use std::time::Duration;

use crate::domain::{AgentHost, MetricKind, MetricSample};

/// Port for the bounded recent window of samples per agent and metric
pub trait MetricStore: Send + Sync {
    /// Store a new sample, evicting the oldest one when the window is full
    fn record(&self, host: &AgentHost, sample: MetricSample);

    /// Samples of `kind` not older than `window`, oldest first
    fn history(&self, host: &AgentHost, kind: MetricKind, window: Duration) -> Vec<MetricSample>;
}
