use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{
    AgentHost, DashboardSummary, HostSnapshot, InterfaceRecord, MetricKind, MonitorError,
    MonitorResult, TimeRange,
};

use super::management::{ManagementController, StatusChangeAck};
use super::registry::AgentRegistry;
use super::state_cache::StateCache;
use super::streamer::{MetricStreamer, Subscription};

/// Poll state of one agent, as reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HostHealth {
    pub agent_host: AgentHost,
    pub polled: bool,
    pub stale: bool,
    pub last_polled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub agents: Vec<HostHealth>,
}

/// Application service behind the HTTP API
pub struct DashboardService {
    registry: Arc<AgentRegistry>,
    cache: Arc<StateCache>,
    streamer: Arc<MetricStreamer>,
    management: Arc<ManagementController>,
}

impl DashboardService {
    pub fn new(
        registry: Arc<AgentRegistry>,
        cache: Arc<StateCache>,
        streamer: Arc<MetricStreamer>,
        management: Arc<ManagementController>,
    ) -> Self {
        Self {
            registry,
            cache,
            streamer,
            management,
        }
    }

    pub fn agent_hosts(&self) -> Vec<AgentHost> {
        self.registry.hosts().to_vec()
    }

    /// Interface counts for one agent
    pub fn interface_summary(&self, host: &str) -> MonitorResult<DashboardSummary> {
        Ok(self.current_snapshot(host)?.summary)
    }

    /// Interface list for the management view
    pub fn interfaces(&self, host: &str) -> MonitorResult<Vec<InterfaceRecord>> {
        Ok(self.current_snapshot(host)?.interfaces)
    }

    pub async fn set_interface_status(
        &self,
        host: &str,
        index: u32,
        status: &str,
    ) -> MonitorResult<StatusChangeAck> {
        self.management.set_interface_status(host, index, status).await
    }

    /// Open a live stream; the host must be registered
    pub fn subscribe(&self, host: &str, kind: MetricKind, range: TimeRange) -> MonitorResult<Subscription> {
        let host = self.registry.resolve(host)?;
        Ok(self.streamer.subscribe(host, kind, range))
    }

    pub fn health(&self) -> HealthReport {
        let agents: Vec<HostHealth> = self
            .registry
            .hosts()
            .iter()
            .map(|host| {
                let snapshot = self.cache.snapshot(host);
                HostHealth {
                    agent_host: host.clone(),
                    polled: self.cache.has_data(host),
                    stale: snapshot.as_ref().is_some_and(|s| s.stale),
                    last_polled_at: snapshot.and_then(|s| s.last_polled_at),
                }
            })
            .collect();

        let status = if agents.iter().any(|a| a.stale || !a.polled) {
            "degraded"
        } else {
            "ok"
        };
        HealthReport { status, agents }
    }

    /// Cached state of a registered host; a host never polled successfully,
    /// or flagged stale, reads as unreachable
    fn current_snapshot(&self, host: &str) -> MonitorResult<HostSnapshot> {
        let host = self.registry.resolve(host)?;
        let snapshot = self
            .cache
            .snapshot(&host)
            .filter(|_| self.cache.has_data(&host))
            .ok_or_else(|| MonitorError::unreachable(&host, "agent has not been polled yet"))?;

        if snapshot.stale {
            return Err(MonitorError::unreachable(&host, "agent stopped answering polls"));
        }
        Ok(snapshot)
    }
}
