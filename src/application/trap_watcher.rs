use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{TrapEvent, TrapNotice};
use crate::ports::{ReceivedTrap, TrapError, TrapReceiver};

use super::registry::AgentRegistry;
use super::state_cache::StateCache;
use super::streamer::{MetricStreamer, StreamEvent};

/// Pause after a socket error so a broken socket cannot spin the loop
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Receives link traps, applies them to the cache and streams them
pub struct TrapWatcher {
    receiver: Arc<dyn TrapReceiver>,
    registry: Arc<AgentRegistry>,
    cache: Arc<StateCache>,
    streamer: Arc<MetricStreamer>,
    community: String,
}

impl TrapWatcher {
    pub fn new(
        receiver: Arc<dyn TrapReceiver>,
        registry: Arc<AgentRegistry>,
        cache: Arc<StateCache>,
        streamer: Arc<MetricStreamer>,
        community: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            registry,
            cache,
            streamer,
            community: community.into(),
        }
    }

    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(&self, shutdown: CancellationToken) {
        info!("Starting trap watcher");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Trap watcher: shutting down");
                    break;
                }
                received = self.receiver.recv() => match received {
                    Ok(trap) => {
                        self.handle(trap, Utc::now());
                    }
                    Err(TrapError::Malformed { source_addr, reason }) => {
                        warn!(source = %source_addr, reason = %reason, "Dropping malformed trap");
                    }
                    Err(e) => {
                        error!(error = %e, "Trap receive failed");
                        tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                    }
                },
            }
        }
    }

    /// Authenticate, attribute and apply one trap received at `received_at`.
    ///
    /// Every rejection is logged and swallowed; returns the streamed notice.
    pub fn handle(&self, trap: ReceivedTrap, received_at: DateTime<Utc>) -> Option<TrapNotice> {
        if trap.community != self.community {
            warn!(source = %trap.source, "Dropping trap with wrong community");
            return None;
        }

        let agent_ip = trap.agent_ip();
        let Some(host) = self.registry.find_by_ip(agent_ip) else {
            warn!(agent = %agent_ip, "Dropping trap from unregistered agent");
            return None;
        };

        let Some(status) = trap.status() else {
            debug!(host = %host, "Ignoring trap that is not a link notification");
            return None;
        };

        let name = trap.if_descr.clone().or_else(|| {
            trap.if_index
                .and_then(|index| self.cache.interface_name(&host, index))
        });
        let Some(name) = name else {
            warn!(host = %host, if_index = ?trap.if_index, "Dropping trap for unresolvable interface");
            return None;
        };

        let mut event = TrapEvent::new(name, status, received_at);
        if let Some(index) = trap.if_index {
            event = event.with_index(index);
        }

        let notice = self.cache.apply_trap(&host, &event)?;
        info!(
            host = %host,
            interface = %notice.interface_name,
            status = %notice.interface_status,
            "Link trap applied"
        );
        self.streamer.publish(&host, StreamEvent::Trap(notice.clone()));
        Some(notice)
    }
}
