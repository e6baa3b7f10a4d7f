//! Minimal stdio server: one `echo` tool that hands back whatever params it
//! was given. Speaks JSON-RPC over stdin/stdout only — logs go to stderr so
//! they never corrupt the wire.

use lucentmcp::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let server_info = Implementation { name: "lucentmcp-echo-server".into(), version: "0.1.0".into() };

    let peer = server::serve_stdio(server_info, ServerCapabilities::default(), |peer| {
        Box::pin(async move {
            peer.register_request_handler("echo", |params: Option<Value>, _cx| async move {
                Ok(params.unwrap_or(Value::Null))
            })
            .await;
        })
    })
    .await;

    tracing::info!("echo-server-stdio handshake complete, serving");

    // The dispatch loop runs on its own task; block here until stdin closes.
    std::future::pending::<()>().await;
    drop(peer);
    Ok(())
}
