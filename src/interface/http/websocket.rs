use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::application::{Delivery, StreamEvent, Subscription};
use crate::domain::{MetricKind, MonitorError, TimeRange};

use super::handlers::{AppError, AppState};

/// Query params of the live streams
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub agent_host: Option<String>,
    pub time_range: Option<String>,
}

/// Client to server message; changes the time range of the open stream
#[derive(Debug, Deserialize)]
struct StreamControl {
    time_range: Option<String>,
}

/// Server to client frame
#[derive(Debug, Serialize)]
struct Frame<'a> {
    data: &'a StreamEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    missed_samples: Option<u64>,
}

fn frame_text(delivery: &Delivery) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Frame {
        data: &delivery.event,
        missed_samples: (delivery.missed > 0).then_some(delivery.missed),
    })
}

/// Handler for /v1/dashboard/uptime
pub async fn uptime_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, AppError> {
    open_stream(ws, &state, &query, MetricKind::Uptime)
}

/// Handler for /v1/dashboard/traffic/usage
pub async fn traffic_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, AppError> {
    open_stream(ws, &state, &query, MetricKind::Traffic)
}

/// Handler for /v1/dashboard/traps
pub async fn traps_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, AppError> {
    open_stream(ws, &state, &query, MetricKind::Traps)
}

/// Validate the request and subscribe before upgrading, so bad requests get a
/// normal `{message}` error instead of an empty socket
fn open_stream(
    ws: WebSocketUpgrade,
    state: &AppState,
    query: &StreamQuery,
    kind: MetricKind,
) -> Result<Response, AppError> {
    let host = query
        .agent_host
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| MonitorError::Validation("agent_host is required".to_string()))?;
    let range = match query.time_range.as_deref() {
        Some(range) => range.parse::<TimeRange>()?,
        None => TimeRange::default(),
    };

    let subscription = state.dashboard.subscribe(host, kind, range)?;
    Ok(ws.on_upgrade(move |socket| stream_subscription(socket, subscription)))
}

async fn stream_subscription(socket: WebSocket, mut subscription: Subscription) {
    let host = subscription.host().clone();
    let kind = subscription.kind();
    info!(host = %host, kind = %kind, "Stream client connected");

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            delivery = subscription.recv() => {
                let Some(delivery) = delivery else {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                let text = match frame_text(&delivery) {
                    Ok(text) => text,
                    Err(e) => {
                        debug!(error = %e, "Failed to serialize stream frame");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let Ok(control) = serde_json::from_str::<StreamControl>(text.as_str()) else {
                        debug!(host = %host, "Ignoring unrecognized client message");
                        continue;
                    };
                    match control.time_range.as_deref().map(str::parse::<TimeRange>) {
                        Some(Ok(range)) => subscription.set_time_range(range),
                        Some(Err(e)) => debug!(host = %host, error = %e, "Ignoring time range change"),
                        None => {}
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(host = %host, error = %e, "Stream socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    info!(host = %host, kind = %kind, "Stream client disconnected");
}
