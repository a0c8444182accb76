//! HTTP surface tests: health probe and the incoming-call webhook.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use callbridge::config::{DEFAULT_INSTRUCTIONS, RelayConfig};
use callbridge::core::realtime::{RealtimeModel, RealtimeVoice};
use callbridge::routes::build_router;
use callbridge::state::AppState;

fn test_config(public_host: Option<&str>) -> RelayConfig {
    RelayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_host: public_host.map(str::to_string),
        tls: None,
        openai_api_key: "sk-test".to_string(),
        model: RealtimeModel::default(),
        voice: RealtimeVoice::default(),
        instructions: DEFAULT_INSTRUCTIONS.to_string(),
        vad_threshold: None,
        temperature: None,
        catalog_api_url: None,
        search_api_key: None,
        search_api_url: None,
        connect_timeout_secs: 15,
        tool_timeout_secs: 10,
    }
}

fn app(public_host: Option<&str>) -> axum::Router {
    build_router(Arc::new(AppState::new(test_config(public_host))))
}

#[tokio::test]
async fn health_probe_reports_ok() {
    let response = app(None)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn webhook_uses_the_host_header() {
    let request = Request::builder()
        .method("POST")
        .uri("/incoming-call")
        .header(header::HOST, "relay.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app(None).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/xml"
    );
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("wss://relay.example.com/media-stream"));
}

#[tokio::test]
async fn webhook_prefers_the_configured_public_host() {
    let request = Request::builder()
        .method("GET")
        .uri("/incoming-call")
        .header(header::HOST, "internal.local:5050")
        .body(Body::empty())
        .unwrap();
    let response = app(Some("tunnel.example.net")).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("wss://tunnel.example.net/media-stream"));
    assert!(!body.contains("internal.local"));
}

#[tokio::test]
async fn media_stream_requires_a_websocket_upgrade() {
    let response = app(None)
        .oneshot(
            Request::builder()
                .uri("/media-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
