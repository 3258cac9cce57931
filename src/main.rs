mod adapters;
mod application;
mod config;
mod domain;
mod interface;
mod ports;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adapters::{MemoryStore, UdpSnmpTransport, UdpTrapReceiver};
use application::{
    AgentRegistry, DashboardService, InterfacePoller, ManagementController, MetricStreamer,
    StateCache, TrapWatcher,
};
use config::Config;
use domain::AgentHost;
use interface::http::create_router;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("netpulse={},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting NetPulse v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", config);

    let registry = Arc::new(AgentRegistry::new(
        config.agent_hosts.iter().map(AgentHost::new),
    ));
    if registry.hosts().is_empty() {
        warn!("⚠ No agent hosts configured. Set NETPULSE_AGENT_HOSTS or agent_hosts in the config file.");
    }

    // Initialize adapters and core components
    let transport = Arc::new(UdpSnmpTransport::new(config.snmp_client())?);
    let store = Arc::new(MemoryStore::new(config.history_size));
    let cache = Arc::new(StateCache::new(config.counter_width()));
    let streamer = Arc::new(MetricStreamer::new(store, config.queue_capacity));
    let poller = Arc::new(InterfacePoller::new(
        transport.clone(),
        Arc::clone(&cache),
        Arc::clone(&streamer),
        config.poller_settings(),
    ));
    let management = Arc::new(ManagementController::new(
        transport,
        Arc::clone(&registry),
        Arc::clone(&cache),
        Arc::clone(&poller),
    ));
    let dashboard = Arc::new(DashboardService::new(
        Arc::clone(&registry),
        Arc::clone(&cache),
        Arc::clone(&streamer),
        management,
    ));

    info!("✓ Dashboard service initialized");

    // Background tasks
    let shutdown = CancellationToken::new();
    poller.spawn_all(registry.hosts(), shutdown.clone());
    info!("✓ Polling {} agent(s) every {}s", registry.hosts().len(), config.poll_interval);

    match UdpTrapReceiver::bind(&config.trap_listen_addr, &config.trap_community).await {
        Ok(receiver) => {
            let watcher = Arc::new(TrapWatcher::new(
                Arc::new(receiver),
                Arc::clone(&registry),
                Arc::clone(&cache),
                Arc::clone(&streamer),
                config.trap_community.clone(),
            ));
            watcher.spawn(shutdown.clone());
            info!("✓ Listening for traps on {}", config.trap_listen_addr);
        }
        Err(e) => {
            warn!(
                "⚠ Failed to bind trap listener on {}: {}. Trap updates disabled.",
                config.trap_listen_addr, e
            );
        }
    }

    // Create HTTP server
    let app = create_router(dashboard, &config.cors_origins);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("✓ NetPulse listening on {}", addr);
    info!("  → API: http://localhost:{}/v1/agent/hosts", config.port);
    info!("  → Streams: ws://localhost:{}/v1/dashboard/uptime", config.port);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("⚠ Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
            server_shutdown.cancel();
            streamer.close_all();
        })
        .await?;

    Ok(())
}
