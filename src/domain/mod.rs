pub mod agent;
pub mod error;
pub mod host;
pub mod interface;
pub mod metrics;
pub mod snmp;
pub mod trap;

pub use agent::AgentHost;
pub use error::{MonitorError, MonitorResult};
pub use host::{DashboardSummary, HostSnapshot};
pub use interface::{InterfaceReading, InterfaceRecord, InterfaceStatus};
pub use metrics::{
    counter_delta, counter_rate, CounterWidth, MetricKind, MetricSample, TimeRange, TrafficSample,
    UptimeSample,
};
pub use snmp::{oids, Oid, SnmpValue, VarBind};
pub use trap::{TrapEvent, TrapNotice};
