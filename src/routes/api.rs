//! Plain HTTP routes
//!
//! The call webhook plus a health probe. Everything else about a call
//! happens over the media stream WebSocket.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::incoming_call_handler;
use crate::state::AppState;

/// Create the REST router.
///
/// `GET /` - health probe
/// `GET|POST /incoming-call` - telephony webhook answering with stream
/// connection instructions
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_handler))
        .route(
            "/incoming-call",
            get(incoming_call_handler).post(incoming_call_handler),
        )
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
