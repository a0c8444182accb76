//! Incoming call webhook
//!
//! The telephony provider hits this endpoint when a call arrives. The
//! response is a TwiML document telling it to open a media stream back to
//! this server's WebSocket endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};

use crate::errors::AppError;
use crate::state::AppState;

/// Respond to an incoming call with connection instructions.
///
/// The stream URL prefers the configured public host; behind a tunnel or
/// proxy the `Host` header the provider dialed is the right fallback.
pub async fn incoming_call_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let host = match &state.config.public_host {
        Some(host) => host.clone(),
        None => headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Internal("no public host configured and no Host header".to_string())
            })?,
    };

    tracing::info!(%host, "incoming call, directing provider to media stream");

    let body = connect_twiml(&host);
    Ok(([(header::CONTENT_TYPE, "text/xml")], body).into_response())
}

/// Build the TwiML document pointing the provider at the stream endpoint.
fn connect_twiml(host: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Say>Please wait while we connect your call.</Say>
    <Connect>
        <Stream url="wss://{host}/media-stream" />
    </Connect>
</Response>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twiml_points_at_the_media_stream() {
        let body = connect_twiml("relay.example.com");
        assert!(body.contains(r#"<Stream url="wss://relay.example.com/media-stream" />"#));
        assert!(body.starts_with("<?xml"));
    }
}
