use thiserror::Error;

/// Failures surfaced by the monitoring core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// Timeout or connection failure after the transport's retry budget
    #[error("device {host} unreachable: {reason}")]
    DeviceUnreachable { host: String, reason: String },

    /// Malformed or rejected SNMP response
    #[error("protocol error from {host}: {reason}")]
    Protocol { host: String, reason: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),
}

impl MonitorError {
    pub fn unreachable(host: impl ToString, reason: impl ToString) -> Self {
        Self::DeviceUnreachable {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn protocol(host: impl ToString, reason: impl ToString) -> Self {
        Self::Protocol {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
