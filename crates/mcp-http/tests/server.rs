//! Integration tests for the HTTP server transport (§8): DNS-rebinding
//! rejection, unknown-session handling, the initialize handshake creating a
//! new session, and request-capture routing a POST's response back to the
//! POST that sent it.

use std::collections::BTreeMap;
use std::sync::Arc;

use lucentmcp_core::Peer;
use lucentmcp_http::{
    DnsRebindingProtection, HTTPRequest, HttpMethod, HttpSessionManager, ServerTransportConfig, MCP_SESSION_ID_HEADER,
};

fn request(method: HttpMethod, headers: &[(&str, &str)], body: &[u8]) -> HTTPRequest {
    let mut map = BTreeMap::new();
    for (k, v) in headers {
        map.insert(k.to_ascii_lowercase(), v.to_string());
    }
    HTTPRequest { method, headers: map, body: body.to_vec() }
}

fn noop_installer() -> lucentmcp_http::HandlerInstaller {
    Arc::new(|peer: Peer| {
        Box::pin(async move {
            peer.register_request_handler("echo", |params: Option<lucentmcp_protocol::Value>, _cx| async move {
                Ok(params.unwrap_or(lucentmcp_protocol::Value::Null))
            })
            .await;
        })
    })
}

fn initialize_body() -> Vec<u8> {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": lucentmcp_protocol::methods::DEFAULT_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {"name": "test", "version": "0.1.0"}
        }
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn dns_rebinding_protection_rejects_mismatched_host() {
    let manager: HttpSessionManager = HttpSessionManager::new(10);
    let mut config = ServerTransportConfig::default();
    config.dns_rebinding_protection =
        DnsRebindingProtection::Custom { allowed_hosts: vec!["trusted.example".into()], allowed_origins: vec![] };

    let req = request(HttpMethod::Post, &[("host", "evil.example")], &initialize_body());
    let resp = lucentmcp_http::handle_post(&manager, &config, &noop_installer(), &req).await;
    assert_eq!(resp.status, 403);
}

#[tokio::test]
async fn post_without_session_header_and_not_initialize_is_bad_request() {
    let manager: HttpSessionManager = HttpSessionManager::new(10);
    let config = ServerTransportConfig { dns_rebinding_protection: DnsRebindingProtection::None, ..Default::default() };

    let body = serde_json::json!({"jsonrpc":"2.0","id":1,"method":"tools/list"}).to_string().into_bytes();
    let req = request(HttpMethod::Post, &[], &body);
    let resp = lucentmcp_http::handle_post(&manager, &config, &noop_installer(), &req).await;
    assert_eq!(resp.status, 400);
}

#[tokio::test]
async fn get_with_unknown_session_is_not_found() {
    let manager: HttpSessionManager = HttpSessionManager::new(10);
    let config = ServerTransportConfig::default();
    let req = request(HttpMethod::Get, &[(MCP_SESSION_ID_HEADER, "does-not-exist")], &[]);
    let resp = lucentmcp_http::handle_get(&manager, &config, &req).await;
    assert_eq!(resp.status, 404);
}

#[tokio::test]
async fn get_is_rejected_in_stateless_mode() {
    let manager: HttpSessionManager = HttpSessionManager::new(10);
    let config = ServerTransportConfig { stateless: true, ..Default::default() };
    let req = request(HttpMethod::Get, &[(MCP_SESSION_ID_HEADER, "anything")], &[]);
    let resp = lucentmcp_http::handle_get(&manager, &config, &req).await;
    assert_eq!(resp.status, 400);
}

#[tokio::test]
async fn stateless_post_is_handled_without_a_session() {
    let manager: HttpSessionManager = HttpSessionManager::new(10);
    let config = ServerTransportConfig {
        dns_rebinding_protection: DnsRebindingProtection::None,
        stateless: true,
        ..Default::default()
    };

    let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}).to_string().into_bytes();
    let req = request(HttpMethod::Post, &[], &body);
    let resp = lucentmcp_http::handle_post(&manager, &config, &noop_installer(), &req).await;

    assert_eq!(resp.status, 200);
    assert!(resp.headers.get(&MCP_SESSION_ID_HEADER.to_ascii_lowercase()).is_none());
    assert_eq!(manager.len().await, 0);
    let body: serde_json::Value = serde_json::from_slice(&resp.body.unwrap()).unwrap();
    assert_eq!(body["id"], 1);
}

#[tokio::test]
async fn initialize_creates_a_session_and_returns_its_id() {
    let manager: HttpSessionManager = HttpSessionManager::new(10);
    let config = ServerTransportConfig { dns_rebinding_protection: DnsRebindingProtection::None, ..Default::default() };

    let req = request(HttpMethod::Post, &[], &initialize_body());
    let resp = lucentmcp_http::handle_post(&manager, &config, &noop_installer(), &req).await;

    assert_eq!(resp.status, 200);
    let session_id = resp.headers.get(&MCP_SESSION_ID_HEADER.to_ascii_lowercase()).cloned();
    assert!(session_id.is_some(), "initialize response must carry a session id");
    assert_eq!(manager.len().await, 1);
}

#[tokio::test]
async fn batched_pings_return_one_result_per_request_in_order() {
    let manager: HttpSessionManager = HttpSessionManager::new(10);
    let config = ServerTransportConfig { dns_rebinding_protection: DnsRebindingProtection::None, ..Default::default() };

    let init_resp = lucentmcp_http::handle_post(&manager, &config, &noop_installer(), &request(HttpMethod::Post, &[], &initialize_body())).await;
    let session_id = init_resp.headers.get(&MCP_SESSION_ID_HEADER.to_ascii_lowercase()).unwrap().clone();

    let batch = serde_json::json!([
        {"jsonrpc": "2.0", "id": 10, "method": "ping"},
        {"jsonrpc": "2.0", "id": 11, "method": "ping"},
    ])
    .to_string()
    .into_bytes();
    let req = request(HttpMethod::Post, &[(MCP_SESSION_ID_HEADER, &session_id)], &batch);
    let resp = lucentmcp_http::handle_post(&manager, &config, &noop_installer(), &req).await;

    assert_eq!(resp.status, 200);
    let body: serde_json::Value = serde_json::from_slice(&resp.body.unwrap()).unwrap();
    let results = body.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["id"], 10);
    assert_eq!(results[1]["id"], 11);
}

#[tokio::test]
async fn delete_removes_the_session() {
    let manager: HttpSessionManager = HttpSessionManager::new(10);
    let config = ServerTransportConfig { dns_rebinding_protection: DnsRebindingProtection::None, ..Default::default() };

    let req = request(HttpMethod::Post, &[], &initialize_body());
    let resp = lucentmcp_http::handle_post(&manager, &config, &noop_installer(), &req).await;
    let session_id = resp.headers.get(&MCP_SESSION_ID_HEADER.to_ascii_lowercase()).unwrap().clone();

    let del_req = request(HttpMethod::Delete, &[(MCP_SESSION_ID_HEADER, &session_id)], &[]);
    let del_resp = lucentmcp_http::handle_delete(&manager, &config, &del_req).await;
    assert_eq!(del_resp.status, 204);
    assert_eq!(manager.len().await, 0);
}
