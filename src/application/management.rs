use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{oids, AgentHost, InterfaceStatus, MonitorError, MonitorResult, SnmpValue};
use crate::ports::SnmpTransport;

use super::poller::InterfacePoller;
use super::registry::AgentRegistry;
use super::state_cache::StateCache;

/// Acknowledgment of an accepted admin status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChangeAck {
    pub host: AgentHost,
    pub interface_index: u32,
    pub admin_status: InterfaceStatus,
}

type InterfaceKey = (AgentHost, u32);

/// Executes admin status changes on agents
pub struct ManagementController {
    transport: Arc<dyn SnmpTransport>,
    registry: Arc<AgentRegistry>,
    cache: Arc<StateCache>,
    poller: Arc<InterfacePoller>,
    in_flight: Mutex<HashMap<InterfaceKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl ManagementController {
    pub fn new(
        transport: Arc<dyn SnmpTransport>,
        registry: Arc<AgentRegistry>,
        cache: Arc<StateCache>,
        poller: Arc<InterfacePoller>,
    ) -> Self {
        Self {
            transport,
            registry,
            cache,
            poller,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Set ifAdminStatus of one interface, then refresh the host out of cycle.
    ///
    /// Nothing is sent to the agent unless the status is `up`/`down`, the host
    /// is registered and the interface exists in the cached snapshot. The cache
    /// is only changed by the refresh poll, never optimistically.
    pub async fn set_interface_status(
        &self,
        host: &str,
        index: u32,
        desired: &str,
    ) -> MonitorResult<StatusChangeAck> {
        let status: InterfaceStatus = desired.parse()?;
        let host = self.registry.resolve(host)?;
        if !self.cache.contains_interface(&host, index) {
            return Err(MonitorError::NotFound(format!(
                "interface {} not found on {}",
                index, host
            )));
        }

        let lock = self.lock_for(&host, index);
        let _guard = lock.lock().await;

        self.transport
            .set(&host, &oids::if_admin_status(index), SnmpValue::Integer(status.code()))
            .await
            .inspect_err(|e| warn!(host = %host, index, error = %e, "Admin status change failed"))?;
        info!(host = %host, index, status = %status, "Admin status changed");

        if let Err(e) = self.poller.poll_once(&host).await {
            warn!(host = %host, error = %e, "Refresh after admin status change failed");
        }

        Ok(StatusChangeAck {
            host,
            interface_index: index,
            admin_status: status,
        })
    }

    fn lock_for(&self, host: &AgentHost, index: u32) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock();
        Arc::clone(in_flight.entry((host.clone(), index)).or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::adapters::MemoryStore;
    use crate::application::poller::PollerSettings;
    use crate::application::streamer::MetricStreamer;
    use crate::application::testing::MockTransport;
    use crate::domain::CounterWidth;

    struct Fixture {
        transport: Arc<MockTransport>,
        cache: Arc<StateCache>,
        controller: ManagementController,
    }

    fn host() -> AgentHost {
        AgentHost::new("10.0.0.1")
    }

    async fn fixture() -> Fixture {
        let transport = Arc::new(MockTransport::with_uptime(60));
        transport.add_interface(1, "eth0", 1, 1, 0, 0);
        transport.add_interface(2, "eth1", 1, 1, 0, 0);

        let registry = Arc::new(AgentRegistry::new([host()]));
        let cache = Arc::new(StateCache::new(CounterWidth::Bits32));
        let streamer = Arc::new(MetricStreamer::new(Arc::new(MemoryStore::new(10)), 8));
        let poller = Arc::new(InterfacePoller::new(
            transport.clone(),
            Arc::clone(&cache),
            streamer,
            PollerSettings::default(),
        ));
        poller.poll_once(&host()).await.unwrap();

        let controller =
            ManagementController::new(transport.clone(), registry, Arc::clone(&cache), poller);
        Fixture {
            transport,
            cache,
            controller,
        }
    }

    #[tokio::test]
    async fn test_missing_interface_is_not_found_without_transport_call() {
        let f = fixture().await;
        let err = f
            .controller
            .set_interface_status("10.0.0.1", 3, "down")
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::NotFound(_)));
        assert_eq!(f.transport.sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_status_rejected_first() {
        let f = fixture().await;
        for desired in ["testing", "UP ", "sideways"] {
            let err = f
                .controller
                .set_interface_status("unknown-host", 3, desired)
                .await
                .unwrap_err();
            assert!(matches!(err, MonitorError::Validation(_)), "{}", desired);
        }
        assert_eq!(f.transport.sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_host_is_not_found() {
        let f = fixture().await;
        let err = f
            .controller
            .set_interface_status("10.0.0.99", 1, "down")
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_set_then_refresh() {
        let f = fixture().await;
        let ack = f
            .controller
            .set_interface_status("10.0.0.1", 2, "down")
            .await
            .unwrap();

        assert_eq!(ack.admin_status, InterfaceStatus::Down);
        assert_eq!(
            f.transport.value(&oids::if_admin_status(2)),
            Some(SnmpValue::Integer(2))
        );

        let snap = f.cache.snapshot(&host()).unwrap();
        assert_eq!(snap.interface(2).unwrap().admin_status, InterfaceStatus::Down);
        assert_eq!(snap.summary.number_of_interfaces_down, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_cache_untouched() {
        let f = fixture().await;
        f.transport.set_unreachable(true);

        let err = f
            .controller
            .set_interface_status("10.0.0.1", 1, "down")
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::DeviceUnreachable { .. }));

        let snap = f.cache.snapshot(&host()).unwrap();
        assert_eq!(snap.interface(1).unwrap().admin_status, InterfaceStatus::Up);
        assert_eq!(snap.summary.number_of_interfaces_up, 2);
    }

    #[tokio::test]
    async fn test_same_interface_shares_lock() {
        let f = fixture().await;
        let a = f.controller.lock_for(&host(), 1);
        let b = f.controller.lock_for(&host(), 1);
        let c = f.controller.lock_for(&host(), 2);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_concurrent_requests_both_complete() {
        let f = fixture().await;
        let (first, second) = tokio::join!(
            f.controller.set_interface_status("10.0.0.1", 1, "down"),
            f.controller.set_interface_status("10.0.0.1", 1, "up"),
        );
        first.unwrap();
        second.unwrap();
        assert_eq!(f.transport.sets.load(Ordering::SeqCst), 2);
    }
}
