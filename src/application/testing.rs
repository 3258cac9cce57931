//! In-memory SNMP device shared by the application tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{oids, AgentHost, MonitorError, MonitorResult, Oid, SnmpValue, VarBind};
use crate::ports::SnmpTransport;

/// Fake agent serving a fixed MIB table; every host sees the same table
#[derive(Default)]
pub struct MockTransport {
    table: Mutex<BTreeMap<Oid, SnmpValue>>,
    unreachable: AtomicBool,
    latency: Mutex<Option<Duration>>,
    walks_in_flight: AtomicUsize,
    pub gets: AtomicUsize,
    pub walks: AtomicUsize,
    /// Most walks ever running at once
    pub peak_walks: AtomicUsize,
    pub sets: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agent with the given uptime (seconds) and no interfaces
    pub fn with_uptime(uptime_secs: u32) -> Self {
        let mock = Self::new();
        mock.insert(oids::sys_uptime(), SnmpValue::TimeTicks(uptime_secs * 100));
        mock
    }

    pub fn insert(&self, oid: Oid, value: SnmpValue) {
        self.table.lock().insert(oid, value);
    }

    pub fn remove_interface(&self, index: u32) {
        self.table.lock().retain(|oid, _| {
            !(oid.starts_with(&oids::if_entry()) && oid.last() == Some(index))
        });
    }

    /// Add an ifTable row; status codes follow IF-MIB (1 up, 2 down)
    pub fn add_interface(&self, index: u32, name: &str, admin: i64, oper: i64, in_octets: u32, out_octets: u32) {
        let col = |c: u32| oids::if_entry_column(c).child(index);
        self.insert(col(oids::IF_INDEX), SnmpValue::Integer(i64::from(index)));
        self.insert(col(oids::IF_DESCR), SnmpValue::OctetString(name.as_bytes().to_vec()));
        self.insert(col(oids::IF_MTU), SnmpValue::Integer(1500));
        self.insert(col(oids::IF_SPEED), SnmpValue::Gauge32(1_000_000_000));
        self.insert(col(oids::IF_ADMIN_STATUS), SnmpValue::Integer(admin));
        self.insert(col(oids::IF_OPER_STATUS), SnmpValue::Integer(oper));
        self.insert(col(oids::IF_IN_OCTETS), SnmpValue::Counter32(in_octets));
        self.insert(col(oids::IF_OUT_OCTETS), SnmpValue::Counter32(out_octets));
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delay every walk, so overlapping callers interleave
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn value(&self, oid: &Oid) -> Option<SnmpValue> {
        self.table.lock().get(oid).cloned()
    }

    fn check(&self, host: &AgentHost) -> MonitorResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(MonitorError::unreachable(host, "no response after 3 attempts"));
        }
        Ok(())
    }
}

#[async_trait]
impl SnmpTransport for MockTransport {
    async fn get(&self, host: &AgentHost, oid: &Oid) -> MonitorResult<SnmpValue> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check(host)?;
        Ok(self.value(oid).unwrap_or(SnmpValue::NoSuchObject))
    }

    async fn get_bulk(&self, host: &AgentHost, prefix: &Oid) -> MonitorResult<Vec<VarBind>> {
        self.walks.fetch_add(1, Ordering::SeqCst);
        let running = self.walks_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_walks.fetch_max(running, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.walks_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check(host)?;
        Ok(self
            .table
            .lock()
            .iter()
            .filter(|(oid, _)| oid.starts_with(prefix))
            .map(|(oid, value)| VarBind::new(oid.clone(), value.clone()))
            .collect())
    }

    async fn set(&self, host: &AgentHost, oid: &Oid, value: SnmpValue) -> MonitorResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check(host)?;

        // the fake link follows its admin status immediately
        let admin_prefix = oids::if_entry_column(oids::IF_ADMIN_STATUS);
        if let (Some(&[index]), Some(code)) = (oid.suffix(&admin_prefix), value.as_i64()) {
            self.insert(
                oids::if_entry_column(oids::IF_OPER_STATUS).child(index),
                SnmpValue::Integer(code),
            );
        }
        self.insert(oid.clone(), value);
        Ok(())
    }
}
