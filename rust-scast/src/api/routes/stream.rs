//! Stream control routes.
//!
//! Start and stop the broadcast session, report its status, and relay
//! session events to WebSocket clients as JSON text frames.

use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::session::{SessionSnapshot, StartSessionRequest, StreamStatus};

/// Heartbeat ping interval in seconds.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Query parameters for the status route.
#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub account_id: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub success: bool,
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    /// Always true; stopping never fails.
    pub success: bool,
    /// Whether a session was running.
    pub stopped: bool,
}

/// Create the stream router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/start", post(start_stream))
        .route("/stop", post(stop_stream))
        .route("/ws", get(stream_events_ws))
}

async fn get_status(
    State(state): State<AppState>,
    Query(params): Query<StatusParams>,
) -> ApiResult<Json<StreamStatus>> {
    if params.account_id.trim().is_empty() {
        return Err(ApiError::bad_request("account_id is required"));
    }
    let status = state.stream_service.get_status(&params.account_id).await?;
    Ok(Json(status))
}

async fn start_stream(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<Json<StartResponse>> {
    let session = state.stream_service.start_session(request).await?;
    Ok(Json(StartResponse {
        success: true,
        session,
    }))
}

async fn stop_stream(State(state): State<AppState>) -> Json<StopResponse> {
    let stopped = state.stream_service.stop_session().await;
    Json(StopResponse {
        success: true,
        stopped,
    })
}

/// WebSocket handler relaying session events.
///
/// Events are delivered at most once to the clients connected when they are
/// published; nothing is replayed on connect.
async fn stream_events_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.events.subscribe();

    let mut heartbeat_interval =
        tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    // The first tick completes immediately.
    heartbeat_interval.tick().await;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    // Clients have nothing to say.
                    _ => {}
                }
            }

            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        let text = match serde_json::to_string(&event) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!("Failed to encode stream event: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = sender.send(Message::Text(text.into())).await {
                            debug!("Failed to send event, closing connection: {}", e);
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Stream event receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Stream event channel closed");
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if awaiting_pong {
                    debug!("Client failed to respond to Ping, closing connection");
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_ok() {
                    awaiting_pong = true;
                } else {
                    break;
                }
            }
        }
    }
}
