use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentHost, InterfaceRecord};

/// Interface counts shown on the dashboard, counted on operational status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub number_of_interfaces: usize,
    pub number_of_interfaces_up: usize,
    pub number_of_interfaces_down: usize,
}

impl DashboardSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a InterfaceRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.number_of_interfaces += 1;
            if record.oper_status.is_up() {
                summary.number_of_interfaces_up += 1;
            } else {
                summary.number_of_interfaces_down += 1;
            }
        }
        summary
    }
}

/// Consistent point-in-time view of one agent
#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub host: AgentHost,
    pub summary: DashboardSummary,
    pub interfaces: Vec<InterfaceRecord>,
    pub uptime_seconds: Option<u64>,
    pub last_polled_at: Option<DateTime<Utc>>,
    /// Set after too many consecutive failed poll cycles
    pub stale: bool,
}

impl HostSnapshot {
    pub fn interface(&self, index: u32) -> Option<&InterfaceRecord> {
        self.interfaces.iter().find(|i| i.index == index)
    }
}
