//! End-to-end scenario (§8): a real client talks to a real server over an
//! actual HTTP socket — `initialize` handshake, then a `ping` round trip —
//! exercising the full facade (`client::connect_http`, `server::build_http_app`,
//! the `axum` router, and the session manager) together rather than any one
//! layer in isolation.

use std::time::Duration;

use lucentmcp::http::ServerTransportConfig;
use lucentmcp::prelude::*;
use tokio::net::TcpListener;

#[tokio::test]
async fn client_handshakes_and_pings_a_real_http_server() {
    let config = ServerTransportConfig { dns_rebinding_protection: lucentmcp::http::DnsRebindingProtection::None, ..Default::default() };
    let installer: lucentmcp::http::HandlerInstaller = std::sync::Arc::new(|peer: Peer| {
        Box::pin(async move {
            let server_info = Implementation { name: "lucentmcp-demo-server".into(), version: "0.1.0".into() };
            lucentmcp::install_server_handshake(&peer, server_info, ServerCapabilities::default()).await;
        })
    });

    let (state, _reaper) = lucentmcp::server::build_http_app(config, installer, Duration::from_secs(60));
    let router = lucentmcp::http::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let endpoint = url::Url::parse(&format!("http://{addr}/mcp")).unwrap();
    let (peer, init_result, _transport) = lucentmcp::client::connect_http(
        endpoint,
        Implementation { name: "test-client".into(), version: "0.1.0".into() },
        ClientCapabilities::default(),
    )
    .await
    .expect("handshake over real HTTP socket succeeds");

    assert_eq!(init_result.server_info.name, "lucentmcp-demo-server");

    let pong = peer.send_request("ping", None, Some(Duration::from_secs(5))).await.unwrap();
    assert_eq!(pong, Value::Object(Default::default()));
}
