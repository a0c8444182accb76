//! Media stream WebSocket route configuration
//!
//! `GET /media-stream` - WebSocket upgrade for the telephony provider's
//! bidirectional audio stream. One connection per call.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::media_stream_handler;
use crate::state::AppState;

/// Create the media stream router.
pub fn create_media_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media-stream", get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
