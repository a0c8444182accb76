//! Route configuration

mod api;
mod media;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Assemble the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::create_api_router())
        .merge(media::create_media_router())
        .with_state(state)
}
