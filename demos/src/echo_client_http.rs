//! Minimal HTTP client: connects, completes the `initialize` handshake, then
//! calls `echo` once with whatever argument is given on the command line.
//!
//! Usage: `echo-client-http <endpoint-url> [message]`

use lucentmcp::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let mut args = std::env::args().skip(1);
    let endpoint = args.next().unwrap_or_else(|| "http://127.0.0.1:8080/mcp".to_string());
    let message = args.next().unwrap_or_else(|| "hello from lucentmcp".to_string());

    let endpoint = url::Url::parse(&endpoint)?;
    let client_info = Implementation { name: "lucentmcp-echo-client".into(), version: "0.1.0".into() };

    let (peer, init_result, _transport) =
        client::connect_http(endpoint, client_info, ClientCapabilities::default()).await?;

    tracing::info!(server = %init_result.server_info.name, version = %init_result.server_info.version, "handshake complete");

    let params: Value = serde_json::json!({ "message": message }).into();
    let echoed = peer.send_request("echo", Some(params), None).await?;
    let echoed: serde_json::Value = echoed.into();
    println!("{echoed}");

    Ok(())
}
