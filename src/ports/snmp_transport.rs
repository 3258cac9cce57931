use async_trait::async_trait;

use crate::domain::{AgentHost, MonitorResult, Oid, SnmpValue, VarBind};

/// Port for talking SNMP to a single agent.
///
/// Implementations retry transient loss internally and report
/// `MonitorError::DeviceUnreachable` once the retry budget is spent;
/// malformed responses are `MonitorError::Protocol` and are not retried.
#[async_trait]
pub trait SnmpTransport: Send + Sync {
    /// GET a single object instance
    async fn get(&self, host: &AgentHost, oid: &Oid) -> MonitorResult<SnmpValue>;

    /// Walk every object under `prefix` (GETBULK until the subtree ends)
    async fn get_bulk(&self, host: &AgentHost, prefix: &Oid) -> MonitorResult<Vec<VarBind>>;

    /// SET a single object instance
    async fn set(&self, host: &AgentHost, oid: &Oid, value: SnmpValue) -> MonitorResult<()>;
}
