//! SNMP adapters over `async_snmp`: request client and trap listener

mod client;
mod trap;
mod wire;

pub use client::{SnmpClientConfig, UdpSnmpTransport};
pub use trap::UdpTrapReceiver;
