use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::InterfaceStatus;

#[derive(Debug, Error)]
pub enum TrapError {
    #[error("trap receiver failed: {0}")]
    Receive(String),

    #[error("malformed trap from {source_addr}: {reason}")]
    Malformed { source_addr: SocketAddr, reason: String },
}

/// Link state announced by the trap type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Up,
    Down,
}

/// Decoded notification, before authentication and correlation
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedTrap {
    pub source: SocketAddr,
    pub community: String,
    /// SNMPv1 agent-addr field
    pub agent_addr: Option<IpAddr>,
    pub link: Option<LinkEvent>,
    pub if_index: Option<u32>,
    pub if_descr: Option<String>,
    pub oper_status: Option<InterfaceStatus>,
}

impl ReceivedTrap {
    /// Address identifying the agent that raised the trap
    pub fn agent_ip(&self) -> IpAddr {
        self.agent_addr.unwrap_or_else(|| self.source.ip())
    }

    /// Reported status: an ifOperStatus varbind wins over the trap type
    pub fn status(&self) -> Option<InterfaceStatus> {
        self.oper_status.or(match self.link {
            Some(LinkEvent::Up) => Some(InterfaceStatus::Up),
            Some(LinkEvent::Down) => Some(InterfaceStatus::Down),
            None => None,
        })
    }
}

/// Port for receiving trap notifications
#[async_trait]
pub trait TrapReceiver: Send + Sync {
    async fn recv(&self) -> Result<ReceivedTrap, TrapError>;
}
