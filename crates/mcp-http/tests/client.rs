//! Integration tests for the HTTP client transport (§8): JSON response
//! handling, HTTP 202 for notifications, and session id capture from the
//! first response header.

use std::time::Duration;

use lucentmcp_http::{HttpClientConfig, HttpClientTransport};
use lucentmcp_transport::{InboundItem, Transport};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn jsonrpc_request(id: i64) -> Vec<u8> {
    serde_json::json!({"jsonrpc": "2.0", "id": id, "method": "ping", "params": {}}).to_string().into_bytes()
}

fn jsonrpc_notification() -> Vec<u8> {
    serde_json::json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string().into_bytes()
}

#[tokio::test]
async fn json_response_is_captured_with_its_session_header() {
    let server = MockServer::start().await;
    let reply = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {}});
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .insert_header("mcp-session-id", "sess-123")
                .set_body_json(&reply),
        )
        .mount(&server)
        .await;

    let mut config = HttpClientConfig::new(Url::parse(&format!("{}/mcp", server.uri())).unwrap());
    config.open_sse_stream = false;
    let transport = HttpClientTransport::new(config);

    transport.send(jsonrpc_request(1)).await.unwrap();
    assert_eq!(transport.session_id().await.as_deref(), Some("sess-123"));

    match transport.receive().await {
        InboundItem::Message(bytes) => {
            let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(value["id"], 1);
        }
        other => panic!("expected a message, got {other}"),
    }
}

#[tokio::test]
async fn notification_post_returns_no_inbound_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/mcp")).respond_with(ResponseTemplate::new(202)).mount(&server).await;

    let mut config = HttpClientConfig::new(Url::parse(&format!("{}/mcp", server.uri())).unwrap());
    config.open_sse_stream = false;
    let transport = HttpClientTransport::new(config);

    transport.send(jsonrpc_notification()).await.unwrap();

    // Nothing should have been queued; confirm with a short timeout rather
    // than blocking forever on an empty channel.
    let outcome = tokio::time::timeout(Duration::from_millis(100), transport.receive()).await;
    assert!(outcome.is_err(), "a 202 must not produce an inbound item");
}

#[tokio::test]
async fn failed_post_surfaces_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/mcp")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    let mut config = HttpClientConfig::new(Url::parse(&format!("{}/mcp", server.uri())).unwrap());
    config.open_sse_stream = false;
    let transport = HttpClientTransport::new(config);

    let err = transport.send(jsonrpc_request(1)).await.unwrap_err();
    assert!(matches!(err, lucentmcp_transport::TransportError::SendFailed(_)));
}
