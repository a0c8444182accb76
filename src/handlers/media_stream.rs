//! Media stream WebSocket handler
//!
//! Upgrades the telephony provider's connection and hands the socket to a
//! session coordinator. One upgrade, one call, one coordinator task.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;

use crate::session::run_call_session;
use crate::state::AppState;

/// Maximum WebSocket message size. Media frames are small; this only has
/// to clear the largest base64 payload a provider might batch.
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Upgrade the media stream connection and run the call session on it.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    tracing::info!("media stream connection upgrade requested");

    ws.max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            if let Err(e) = run_call_session(socket, state).await {
                tracing::error!("call session failed: {e}");
            }
        })
}
