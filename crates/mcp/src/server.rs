//! Ergonomic server-side serve helpers: stdio (one client per process) and
//! HTTP (many sessions behind one `axum::Router`), both built on the same
//! `HandlerInstaller` closure a caller supplies to wire its tools/resources/
//! prompts onto every freshly handshaked [`Peer`].

use std::sync::Arc;
use std::time::Duration;

use lucentmcp_core::{install_server_handshake, spawn_dispatch_loop, Peer, PeerConfig, Role};
use lucentmcp_http::{AppState, HandlerInstaller, HttpSessionManager, ServerTransportConfig};
use lucentmcp_protocol::capabilities::ServerCapabilities;
use lucentmcp_protocol::initialize::Implementation;
use lucentmcp_transport::StdioTransport;

/// Serve one client over the process's stdin/stdout: install the caller's
/// handlers, run the handshake to completion, and hand back the connected
/// [`Peer`] for further use (e.g. emitting unsolicited notifications).
pub async fn serve_stdio(
    server_info: Implementation,
    capabilities: ServerCapabilities,
    installer: impl FnOnce(Peer) -> futures::future::BoxFuture<'static, ()>,
) -> Peer {
    let transport = Arc::new(StdioTransport::process_pair());
    let peer = Peer::new(transport.clone(), PeerConfig::new(Role::Server));
    installer(peer.clone()).await;
    let handshake = install_server_handshake(&peer, server_info, capabilities).await;
    spawn_dispatch_loop(transport, peer.clone());
    handshake.wait().await;
    tracing::info!("stdio server handshake complete");
    peer
}

/// Build the shared state for an HTTP server exposing every session behind
/// one `axum::Router`, and spawn the stale-session reaper (§11). The
/// `installer` runs once per freshly created session, exactly as with
/// [`serve_stdio`]'s closure.
pub fn build_http_app(
    config: ServerTransportConfig,
    installer: HandlerInstaller,
    idle_timeout: Duration,
) -> (Arc<AppState>, tokio::task::JoinHandle<()>) {
    let manager: Arc<HttpSessionManager> = Arc::new(HttpSessionManager::new(config.max_sessions));
    let on_closed = config.on_session_closed.clone();
    let reaper = manager.spawn_reaper(idle_timeout / 4, idle_timeout, move |id| {
        if let Some(hook) = &on_closed {
            hook(id);
        }
    });
    let state = Arc::new(AppState { manager, config, installer });
    (state, reaper)
}
