pub mod management;
pub mod monitoring;
pub mod poller;
pub mod registry;
pub mod state_cache;
pub mod streamer;
pub mod trap_watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use management::{ManagementController, StatusChangeAck};
pub use monitoring::{DashboardService, HealthReport, HostHealth};
pub use poller::{InterfacePoller, PollerSettings};
pub use registry::AgentRegistry;
pub use state_cache::{ApplyOutcome, PollUpdate, StateCache};
pub use streamer::{Delivery, MetricStreamer, StreamEvent, Subscription, DEFAULT_QUEUE_CAPACITY};
pub use trap_watcher::TrapWatcher;
