//! HTTP transport against a local axum server standing in for the generation endpoint.

mod common;

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use toolpulse::core::config::GenerationConfig;
use toolpulse::core::errors::TpError;
use toolpulse::store::backend::Fields;
use toolpulse::tracking::generation::{GenerationClient, GenerationRequest, HttpTransport, PromptTransport};

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    let prompt = body["prompt"].as_str().unwrap_or_default();
    let has_inline = !body["inlineData"].is_null();
    Json(json!({
        "candidates": [{"content": {"parts": [{"text": format!("echo:{prompt}:{has_inline}")}]}}]
    }))
}

async fn app_error() -> Json<Value> {
    Json(json!({"error": "model overloaded"}))
}

async fn unavailable() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance")
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/api/prompt", post(echo))
        .route("/api/error", post(app_error))
        .route("/api/down", post(unavailable));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

fn config_for(addr: SocketAddr, path: &str) -> GenerationConfig {
    GenerationConfig {
        endpoint: format!("http://{addr}{path}"),
        timeout_ms: 5_000,
    }
}

#[tokio::test]
async fn transport_posts_prompt_and_inline_data() {
    let addr = spawn_server().await;
    let transport = HttpTransport::new(&config_for(addr, "/api/prompt")).unwrap();

    let response = transport
        .send(&GenerationRequest {
            prompt: "hello".to_string(),
            inline_data: Some(json!({"mimeType": "image/jpeg", "data": "..."})),
        })
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(
        body["candidates"][0]["content"]["parts"][0]["text"],
        json!("echo:hello:true")
    );
}

#[tokio::test]
async fn client_returns_text_from_live_endpoint() {
    let addr = spawn_server().await;
    let tracker = common::fallback_tracker();
    let client = GenerationClient::http(tracker.clone(), &config_for(addr, "/api/prompt")).unwrap();

    let text = client
        .generate("rewrite me", "text_rewriter", Fields::new(), None)
        .await
        .unwrap();
    assert_eq!(text, "echo:rewrite me:false");
    assert_eq!(common::events_named(&tracker, "api_call_success").len(), 1);
}

#[tokio::test]
async fn application_error_field_surfaces_as_request_failed() {
    let addr = spawn_server().await;
    let tracker = common::fallback_tracker();
    let client = GenerationClient::http(tracker.clone(), &config_for(addr, "/api/error")).unwrap();

    let err = client
        .generate("p", "text_rewriter", Fields::new(), None)
        .await
        .unwrap_err();
    match err {
        TpError::RequestFailed { message, status } => {
            assert_eq!(message, "model overloaded");
            assert_eq!(status, Some(200));
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_error_page_surfaces_status() {
    let addr = spawn_server().await;
    let tracker = common::fallback_tracker();
    let client = GenerationClient::http(tracker.clone(), &config_for(addr, "/api/down")).unwrap();

    let err = client
        .generate("p", "text_rewriter", Fields::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TpError::RequestFailed { status: Some(503), .. }));
    assert_eq!(common::events_named(&tracker, "api_call_error").len(), 1);
}

#[tokio::test]
async fn unreachable_endpoint_is_a_request_failure() {
    let addr = spawn_server().await;
    let transport = HttpTransport::new(&GenerationConfig {
        endpoint: format!("http://{}:9/api/prompt", addr.ip()),
        timeout_ms: 2_000,
    })
    .unwrap();
    let err = transport
        .send(&GenerationRequest {
            prompt: "p".to_string(),
            inline_data: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TpError::RequestFailed { status: None, .. }));
}
