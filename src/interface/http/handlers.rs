use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::{DashboardService, HealthReport};
use crate::domain::{AgentHost, DashboardSummary, InterfaceRecord, MonitorError};

/// Error returned by handlers, rendered as `{message}`
#[derive(Debug)]
pub struct AppError(MonitorError);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0 {
            MonitorError::DeviceUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            MonitorError::Protocol { .. } => StatusCode::BAD_GATEWAY,
            MonitorError::NotFound(_) => StatusCode::NOT_FOUND,
            MonitorError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, "Request failed");
        }
        (status, Json(ErrorBody { message: self.0.to_string() })).into_response()
    }
}

impl From<MonitorError> for AppError {
    fn from(err: MonitorError) -> Self {
        AppError(err)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub dashboard: Arc<DashboardService>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Success envelope shared by every REST endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub message: &'static str,
    pub data: T,
}

fn success<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        message: "successfully",
        data,
    })
}

/// Query params selecting the agent
#[derive(Debug, Deserialize)]
pub struct HostQuery {
    pub agent_host: Option<String>,
}

impl HostQuery {
    pub fn agent_host(&self) -> Result<&str, AppError> {
        self.agent_host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MonitorError::Validation("agent_host is required".to_string()).into())
    }
}

/// Response for /v1/agent/hosts
#[derive(Debug, Serialize)]
pub struct AgentHostsResponse {
    pub agent_hosts: Vec<AgentHost>,
}

/// Row of /v1/management/interfaces
#[derive(Debug, Serialize)]
pub struct InterfaceResponse {
    pub interface_name: String,
    pub interface_index: u32,
    pub interface_mtu: u32,
    pub interface_speed: u64,
    /// IF-MIB code: 1 up, 2 down, 3 testing
    pub interface_admin_status: i64,
}

impl From<&InterfaceRecord> for InterfaceResponse {
    fn from(record: &InterfaceRecord) -> Self {
        Self {
            interface_name: record.name.clone(),
            interface_index: record.index,
            interface_mtu: record.mtu,
            interface_speed: record.speed,
            interface_admin_status: record.admin_status.code(),
        }
    }
}

/// Handler for GET /v1/health
pub async fn health_handler(State(state): State<AppState>) -> Json<ApiResponse<HealthReport>> {
    success(state.dashboard.health())
}

/// Handler for GET /v1/agent/hosts
pub async fn agent_hosts_handler(State(state): State<AppState>) -> Json<ApiResponse<AgentHostsResponse>> {
    success(AgentHostsResponse {
        agent_hosts: state.dashboard.agent_hosts(),
    })
}

/// Handler for GET /v1/dashboard/interfaces
pub async fn interface_summary_handler(
    State(state): State<AppState>,
    Query(query): Query<HostQuery>,
) -> Result<Json<ApiResponse<DashboardSummary>>, AppError> {
    let summary = state.dashboard.interface_summary(query.agent_host()?)?;
    Ok(success(summary))
}

/// Handler for GET /v1/management/interfaces
pub async fn management_interfaces_handler(
    State(state): State<AppState>,
    Query(query): Query<HostQuery>,
) -> Result<Json<ApiResponse<Vec<InterfaceResponse>>>, AppError> {
    let interfaces = state.dashboard.interfaces(query.agent_host()?)?;
    Ok(success(interfaces.iter().map(InterfaceResponse::from).collect()))
}

/// Handler for PATCH /v1/management/interfaces/{index}/{status}
pub async fn set_interface_status_handler(
    State(state): State<AppState>,
    Path((index, status)): Path<(String, String)>,
    Query(query): Query<HostQuery>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let index: u32 = index
        .parse()
        .map_err(|_| MonitorError::Validation(format!("invalid interface index '{}'", index)))?;

    state
        .dashboard
        .set_interface_status(query.agent_host()?, index, &status)
        .await?;
    Ok(success(()))
}
