//! Ergonomic client-side connect helpers: wire a transport to a fresh
//! [`Peer`], run the `initialize` handshake, and hand back both.

use std::sync::Arc;
use std::time::Duration;

use lucentmcp_core::{spawn_dispatch_loop, perform_client_handshake, HandshakeMode, Peer, PeerConfig, Role};
use lucentmcp_http::{HttpClientConfig, HttpClientTransport};
use lucentmcp_protocol::capabilities::ClientCapabilities;
use lucentmcp_protocol::initialize::{Implementation, InitializeResult};
use lucentmcp_protocol::Result;
use lucentmcp_transport::StdioTransport;
use url::Url;

/// Connect over the current process's stdin/stdout (the common case for an
/// MCP client launching a server as a child process, or vice versa).
pub async fn connect_stdio(
    client_info: Implementation,
    capabilities: ClientCapabilities,
) -> Result<(Peer, InitializeResult)> {
    let transport = Arc::new(StdioTransport::process_pair());
    connect(transport, client_info, capabilities, HandshakeMode::Default).await
}

/// Connect to an HTTP+SSE MCP server at `endpoint`. The returned
/// [`HttpClientTransport`] is also handed back so callers can inspect the
/// negotiated session id or call `disconnect()` explicitly.
pub async fn connect_http(
    endpoint: Url,
    client_info: Implementation,
    capabilities: ClientCapabilities,
) -> Result<(Peer, InitializeResult, Arc<HttpClientTransport>)> {
    let transport = HttpClientTransport::new(HttpClientConfig::new(endpoint));
    let (peer, result) = connect(transport.clone(), client_info, capabilities, HandshakeMode::Default).await?;
    Ok((peer, result, transport))
}

async fn connect(
    transport: Arc<dyn lucentmcp_transport::Transport>,
    client_info: Implementation,
    capabilities: ClientCapabilities,
    mode: HandshakeMode,
) -> Result<(Peer, InitializeResult)> {
    let mut config = PeerConfig::new(Role::Client).with_default_timeout(Duration::from_secs(30));
    if matches!(mode, HandshakeMode::Strict) {
        config = config.strict();
    }
    let peer = Peer::new(transport.clone(), config);
    spawn_dispatch_loop(transport, peer.clone());
    let result = perform_client_handshake(&peer, client_info, capabilities).await?;
    tracing::info!(server = %result.server_info.name, version = %result.protocol_version, "client handshake complete");
    Ok((peer, result))
}
