use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Address of a managed SNMP agent, as configured (`10.0.0.1`, `switch-a`, `10.0.0.1:1161`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentHost(String);

impl AgentHost {
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Literal IP address of the agent, if the host is not a DNS name
    pub fn ip(&self) -> Option<IpAddr> {
        if let Ok(addr) = self.0.parse::<SocketAddr>() {
            return Some(addr.ip());
        }
        self.0.trim_start_matches('[').trim_end_matches(']').parse().ok()
    }
}

impl fmt::Display for AgentHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AgentHost {
    fn from(host: String) -> Self {
        Self::new(host)
    }
}

impl From<&str> for AgentHost {
    fn from(host: &str) -> Self {
        Self::new(host)
    }
}
