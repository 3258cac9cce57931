pub mod metric_store;
pub mod snmp_transport;
pub mod trap_receiver;

pub use metric_store::MetricStore;
pub use snmp_transport::SnmpTransport;
pub use trap_receiver::{LinkEvent, ReceivedTrap, TrapError, TrapReceiver};
