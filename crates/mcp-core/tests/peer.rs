//! Integration tests for the peer engine, exercised over a paired in-memory
//! transport rather than mocks (§8: correlation, capability gating,
//! cancellation/timeout, progress).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lucentmcp_core::{HandshakeMode, Peer, PeerConfig, RequestContext, Role};
use lucentmcp_protocol::capabilities::{ClientCapabilities, ListChangedCapability, ServerCapabilities};
use lucentmcp_protocol::initialize::Implementation;
use lucentmcp_protocol::{Error, ProgressToken, Value};
use lucentmcp_transport::InMemoryTransport;

fn implementation(name: &str) -> Implementation {
    Implementation { name: name.into(), version: "0.1.0".into() }
}

async fn connected_pair(
    server_capabilities: ServerCapabilities,
    client_capabilities: ClientCapabilities,
    mode: HandshakeMode,
) -> (Peer, Peer) {
    let (client_transport, server_transport) = InMemoryTransport::pair();
    let client_transport = Arc::new(client_transport);
    let server_transport = Arc::new(server_transport);

    let mut client_config = PeerConfig::new(Role::Client);
    let mut server_config = PeerConfig::new(Role::Server);
    if matches!(mode, HandshakeMode::Strict) {
        client_config = client_config.strict();
        server_config = server_config.strict();
    }

    let client = Peer::new(client_transport.clone(), client_config);
    let server = Peer::new(server_transport.clone(), server_config);

    lucentmcp_core::spawn_dispatch_loop(client_transport, client.clone());
    lucentmcp_core::spawn_dispatch_loop(server_transport, server.clone());

    let handshake = lucentmcp_core::install_server_handshake(&server, implementation("test-server"), server_capabilities).await;
    lucentmcp_core::perform_client_handshake(&client, implementation("test-client"), client_capabilities)
        .await
        .expect("handshake succeeds");
    handshake.wait().await;

    (client, server)
}

#[tokio::test]
async fn request_response_round_trips_through_registered_handler() {
    let (client, server) = connected_pair(ServerCapabilities::default(), ClientCapabilities::default(), HandshakeMode::Default).await;

    server
        .register_request_handler("echo", |params: Option<Value>, _cx| async move {
            Ok(params.unwrap_or(Value::Null))
        })
        .await;

    let payload = Value::from(serde_json::json!({"hello": "world"}));
    let result = client.send_request("echo", Some(payload.clone()), Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(result, payload);
}

#[tokio::test]
async fn unregistered_method_returns_method_not_found() {
    let (client, _server) = connected_pair(ServerCapabilities::default(), ClientCapabilities::default(), HandshakeMode::Default).await;

    let err = client.send_request("nonexistent/method", None, Some(Duration::from_secs(1))).await.unwrap_err();
    assert!(matches!(err, Error::MethodNotFound(_)));
}

#[tokio::test]
async fn strict_mode_rejects_unadvertised_capability_locally() {
    let (client, _server) = connected_pair(ServerCapabilities::default(), ClientCapabilities::default(), HandshakeMode::Strict).await;

    let err = client.send_request("tools/list", None, Some(Duration::from_secs(1))).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn advertised_capability_reaches_the_handler() {
    let mut server_capabilities = ServerCapabilities::default();
    server_capabilities.tools = Some(ListChangedCapability { list_changed: Some(false) });
    let (client, server) = connected_pair(server_capabilities, ClientCapabilities::default(), HandshakeMode::Strict).await;

    server
        .register_request_handler("tools/list", |_params, _cx| async move {
            Ok(Value::from(serde_json::json!({"tools": []})))
        })
        .await;

    let result = client.send_request("tools/list", None, Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(result.as_object().unwrap().get("tools").unwrap(), &Value::Array(vec![]));
}

#[tokio::test]
async fn timeout_resolves_the_waiter_and_notifies_cancellation() {
    let (client, server) = connected_pair(ServerCapabilities::default(), ClientCapabilities::default(), HandshakeMode::Default).await;

    let observed_cancel = Arc::new(AtomicBool::new(false));
    let observed_cancel_in_handler = observed_cancel.clone();
    server
        .register_request_handler("slow", move |_params, cx: RequestContext| {
            let observed_cancel = observed_cancel_in_handler.clone();
            async move {
                for _ in 0..20 {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    if cx.is_cancelled() {
                        observed_cancel.store(true, Ordering::SeqCst);
                        return Err(Error::RequestCancelled(cx.request_id().to_string()));
                    }
                }
                Ok(Value::Null)
            }
        })
        .await;

    let err = client.send_request("slow", None, Some(Duration::from_millis(50))).await.unwrap_err();
    assert!(matches!(err, Error::RequestTimeout(_)));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(observed_cancel.load(Ordering::SeqCst), "handler should have observed the cancellation flag");
}

#[tokio::test]
async fn progress_notifications_reach_a_registered_handler() {
    let (client, server) = connected_pair(ServerCapabilities::default(), ClientCapabilities::default(), HandshakeMode::Default).await;

    let progress_events: Arc<tokio::sync::Mutex<Vec<f64>>> = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let events_for_handler = progress_events.clone();
    client
        .register_notification_handler("notifications/progress", move |params: Option<Value>| {
            let events = events_for_handler.clone();
            async move {
                if let Some(p) = params.and_then(|v| v.as_object().and_then(|m| m.get("progress").cloned())) {
                    if let Some(n) = p.as_f64() {
                        events.lock().await.push(n);
                    }
                }
            }
        })
        .await;

    server
        .register_request_handler("reports-progress", |_params, cx: RequestContext| async move {
            cx.report_progress(0.5, Some(1.0), None).await;
            cx.report_progress(1.0, Some(1.0), None).await;
            Ok(Value::Null)
        })
        .await;

    let token = ProgressToken::Integer(42);
    client
        .send_request_with_progress("reports-progress", None, token, Some(Duration::from_secs(1)))
        .await
        .unwrap();

    // Progress notifications are fire-and-forget; give the dispatch loop a
    // moment to deliver both before asserting.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = progress_events.lock().await;
    assert_eq!(*events, vec![0.5, 1.0]);
}

#[tokio::test]
async fn cancelling_an_already_resolved_request_is_a_no_op() {
    let (client, server) = connected_pair(ServerCapabilities::default(), ClientCapabilities::default(), HandshakeMode::Default).await;

    server
        .register_request_handler("instant", |_params, _cx| async move { Ok(Value::Null) })
        .await;

    client.send_request("instant", None, Some(Duration::from_secs(1))).await.unwrap();

    // The request already completed and was removed from the pending table;
    // cancelling a request id that isn't pending anymore must not error (§5).
    client.cancel(lucentmcp_protocol::RequestId::Integer(1)).await.unwrap();
}
