use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::InterfaceStatus;

/// Interface status change reported by an agent trap
#[derive(Debug, Clone, PartialEq)]
pub struct TrapEvent {
    pub interface_name: String,
    pub interface_index: Option<u32>,
    pub status: InterfaceStatus,
    /// Receipt time
    pub timestamp: DateTime<Utc>,
}

impl TrapEvent {
    pub fn new(interface_name: impl Into<String>, status: InterfaceStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            interface_name: interface_name.into(),
            interface_index: None,
            status,
            timestamp,
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.interface_index = Some(index);
        self
    }
}

/// Status change pushed on the traps stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrapNotice {
    pub interface_name: String,
    pub interface_index: u32,
    pub interface_status: InterfaceStatus,
}
