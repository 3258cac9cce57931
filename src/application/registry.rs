use std::net::IpAddr;

use crate::domain::{AgentHost, MonitorError, MonitorResult};

/// Configured set of SNMP agents
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    hosts: Vec<AgentHost>,
}

impl AgentRegistry {
    /// Build from configuration, dropping blanks and duplicates while keeping order
    pub fn new(hosts: impl IntoIterator<Item = AgentHost>) -> Self {
        let mut unique: Vec<AgentHost> = Vec::new();
        for host in hosts {
            if !host.as_str().is_empty() && !unique.contains(&host) {
                unique.push(host);
            }
        }
        Self { hosts: unique }
    }

    pub fn hosts(&self) -> &[AgentHost] {
        &self.hosts
    }

    /// Registered host for a request parameter
    pub fn resolve(&self, host: &str) -> MonitorResult<AgentHost> {
        self.hosts
            .iter()
            .find(|h| h.as_str() == host.trim())
            .cloned()
            .ok_or_else(|| MonitorError::NotFound(format!("unknown agent host '{}'", host)))
    }

    /// Registered host with the given address (used to attribute traps)
    pub fn find_by_ip(&self, ip: IpAddr) -> Option<AgentHost> {
        self.hosts.iter().find(|h| h.ip() == Some(ip)).cloned()
    }
}
