pub mod snmp;
pub mod store;

pub use snmp::{SnmpClientConfig, UdpSnmpTransport, UdpTrapReceiver};
pub use store::MemoryStore;
