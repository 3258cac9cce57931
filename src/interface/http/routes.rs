use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::application::DashboardService;

use super::handlers::{
    agent_hosts_handler, health_handler, interface_summary_handler, management_interfaces_handler,
    set_interface_status_handler, AppState,
};
use super::websocket::{traffic_stream_handler, traps_stream_handler, uptime_stream_handler};

pub fn create_router(dashboard: Arc<DashboardService>, cors_origins: &[String]) -> Router {
    let state = AppState { dashboard };

    Router::new()
        // REST
        .route("/v1/health", get(health_handler))
        .route("/v1/agent/hosts", get(agent_hosts_handler))
        .route("/v1/dashboard/interfaces", get(interface_summary_handler))
        .route("/v1/management/interfaces", get(management_interfaces_handler))
        .route(
            "/v1/management/interfaces/{index}/{status}",
            patch(set_interface_status_handler),
        )
        // Live streams
        .route("/v1/dashboard/uptime", get(uptime_stream_handler))
        .route("/v1/dashboard/traffic/usage", get(traffic_stream_handler))
        .route("/v1/dashboard/traps", get(traps_stream_handler))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
