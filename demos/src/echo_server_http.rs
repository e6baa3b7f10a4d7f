//! Minimal HTTP+SSE server exposing one `echo` tool behind `axum::serve`.
//! Binds `127.0.0.1:8080` by default; override with `ECHO_SERVER_ADDR`.

use std::sync::Arc;
use std::time::Duration;

use lucentmcp::http::{DnsRebindingProtection, HandlerInstaller, ServerTransportConfig};
use lucentmcp::install_server_handshake;
use lucentmcp::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let addr = std::env::var("ECHO_SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let config = ServerTransportConfig {
        dns_rebinding_protection: DnsRebindingProtection::Automatic { bind_host: "127.0.0.1".into() },
        ..Default::default()
    };

    let installer: HandlerInstaller = Arc::new(|peer: Peer| {
        Box::pin(async move {
            peer.register_request_handler("echo", |params: Option<Value>, _cx| async move {
                Ok(params.unwrap_or(Value::Null))
            })
            .await;

            let server_info = Implementation { name: "lucentmcp-echo-server".into(), version: "0.1.0".into() };
            install_server_handshake(&peer, server_info, ServerCapabilities::default()).await;
        })
    });

    let (state, _reaper) = server::build_http_app(config, installer, Duration::from_secs(300));
    let router = lucentmcp::http::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "echo-server-http listening");
    axum::serve(listener, router).await?;
    Ok(())
}
