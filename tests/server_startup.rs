//! Server Startup Tests
//!
//! Tests for the HTTP surface: health check, call-setup webhook and live
//! transfer, plus the server binding and answering on a real port.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, body::Body, http::Request};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::time::timeout;
use tower::util::ServiceExt;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use callbridge_gateway::core::telephony::{CallTransfer, TwilioCallTransfer};
use callbridge_gateway::{ServerConfig, routes, state::AppState};

/// Helper function to create a minimal test configuration
fn create_minimal_config(port: u16) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        tls: None,
        public_host: None,
        openai_api_key: "sk-test".to_string(),
        openai_realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
        openai_realtime_model: "gpt-4o-realtime-preview-2024-10-01".to_string(),
        voice: "alloy".to_string(),
        system_message: "You are a helpful assistant.".to_string(),
        opening_message: None,
        speaks_first: false,
        temperature: 0.8,
        session_init_delay_ms: 100,
        declared_tools: vec!["scheduleCallback".to_string(), "addToDNC".to_string()],
        show_timing_math: false,
        twilio_account_sid: None,
        twilio_auth_token: None,
        twilio_api_base_url: "https://api.twilio.com".to_string(),
        transfer_phone_number: None,
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 60,
        rate_limit_burst_size: 10,
    }
}

/// Find an available port for testing
fn find_available_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn create_app(state: Arc<AppState>) -> Router {
    routes::api::create_api_router()
        .merge(routes::media_stream::create_media_stream_router())
        .with_state(state)
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// State wired to a mock telephony REST API
async fn transfer_state(api: &MockServer) -> Arc<AppState> {
    let mut config = create_minimal_config(find_available_port());
    config.transfer_phone_number = Some("+15550199".to_string());

    let transfer =
        TwilioCallTransfer::new("AC123".to_string(), "secret".to_string(), Some(api.uri()))
            .unwrap();
    AppState::with_call_transfer(config, Some(Arc::new(transfer) as Arc<dyn CallTransfer>))
}

#[tokio::test]
async fn test_health_check() {
    let state = AppState::new(create_minimal_config(find_available_port())).await;
    let app = create_app(state);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Twilio Media Stream Server is running!");
}

#[tokio::test]
async fn test_incoming_call_returns_stream_markup() {
    let state = AppState::new(create_minimal_config(find_available_port())).await;
    let app = create_app(state);

    let request = Request::builder()
        .method("POST")
        .uri("/incoming-call")
        .header("host", "relay.example.com")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("CallSid=CA123&From=%2B15550100&To=%2B15550111"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/xml");
    let body = body_text(response).await;
    assert_eq!(
        body,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Connect>\
         <Stream url=\"wss://relay.example.com/media-stream\">\
         <Parameter name=\"callSid\" value=\"CA123\" /></Stream>\
         </Connect></Response>"
    );
}

#[tokio::test]
async fn test_incoming_call_get_without_call_sid() {
    let state = AppState::new(create_minimal_config(find_available_port())).await;
    let app = create_app(state);

    let request = Request::builder()
        .uri("/incoming-call")
        .header("host", "relay.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 200);
    let body = body_text(response).await;
    assert!(body.contains("<Stream url=\"wss://relay.example.com/media-stream\"></Stream>"));
    assert!(!body.contains("<Parameter"));
}

#[tokio::test]
async fn test_incoming_call_prefers_public_host() {
    let mut config = create_minimal_config(find_available_port());
    config.public_host = Some("calls.example.org".to_string());
    let app = create_app(AppState::new(config).await);

    let request = Request::builder()
        .uri("/incoming-call?CallSid=CA9")
        .header("host", "10.0.0.5:5050")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let body = body_text(response).await;
    assert!(body.contains("wss://calls.example.org/media-stream"));
    assert!(body.contains("value=\"CA9\""));
}

#[tokio::test]
async fn test_incoming_call_without_host_is_bad_request() {
    let state = AppState::new(create_minimal_config(find_available_port())).await;
    let app = create_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/incoming-call")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_transfer_not_configured() {
    let state = AppState::new(create_minimal_config(find_available_port())).await;
    let app = create_app(state);

    let request = Request::builder()
        .method("POST")
        .uri("/transfer")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"callSid":"CA123"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 503);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn test_transfer_updates_live_call() {
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC123/Calls/CA123.json"))
        .and(header("authorization", "Basic QUMxMjM6c2VjcmV0"))
        .and(body_string_contains("Twiml="))
        .and(body_string_contains("%2B15550199"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "sid": "CA123",
            "status": "in-progress"
        })))
        .expect(1)
        .mount(&api)
        .await;

    let app = create_app(transfer_state(&api).await);
    let request = Request::builder()
        .method("POST")
        .uri("/transfer")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"callSid":"CA123"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 200);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Call transferred successfully");
}

#[tokio::test]
async fn test_transfer_api_error_is_reported() {
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/AC123/Calls/CA404.json"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "code": 20404,
            "message": "The requested resource was not found",
            "status": 404
        })))
        .mount(&api)
        .await;

    let app = create_app(transfer_state(&api).await);
    let request = Request::builder()
        .method("POST")
        .uri("/transfer")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"callSid":"CA404"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 500);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("The requested resource was not found")
    );
}

#[tokio::test]
async fn test_transfer_rejects_malformed_call_sid() {
    let api = MockServer::start().await;
    let app = create_app(transfer_state(&api).await);

    let request = Request::builder()
        .method("POST")
        .uri("/transfer")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"callSid":"../Accounts"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), 400);
    assert!(api.received_requests().await.unwrap().is_empty());
}

/// Test that the server binds and answers on a real port
#[tokio::test]
async fn test_server_binds_and_serves() {
    let port = find_available_port();
    let config = create_minimal_config(port);
    let address = config.address();
    let app = create_app(AppState::new(config).await);

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let response = timeout(
        Duration::from_secs(5),
        client.get(format!("http://{address}/")).send(),
    )
    .await
    .expect("server did not answer in time")
    .unwrap();

    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Twilio Media Stream Server is running!");

    server.abort();
}
