//! Client- and server-side `initialize` handshake routines (§4.2).
//!
//! Both directions reduce to the same peer engine; only the order of
//! "who sends `initialize`" and "when is `mark_initialized` called" differ.
//! The client side completes the handshake the moment it receives the
//! `InitializeResult`; the server side waits for the follow-up
//! `notifications/initialized` before considering itself initialized,
//! mirroring the MCP three-message exchange.

use std::sync::Arc;

use tokio::sync::Notify;

use lucentmcp_protocol::capabilities::{ClientCapabilities, ServerCapabilities};
use lucentmcp_protocol::initialize::{Implementation, InitializeParams, InitializeResult};
use lucentmcp_protocol::methods::{negotiate_protocol_version, wire, DEFAULT_PROTOCOL_VERSION};
use lucentmcp_protocol::{Error, Result, Value};

use crate::peer::Peer;

/// Client role: send `initialize`, negotiate the protocol version against
/// what the server accepted, then confirm with `notifications/initialized`.
pub async fn perform_client_handshake(
    peer: &Peer,
    client_info: Implementation,
    capabilities: ClientCapabilities,
) -> Result<InitializeResult> {
    let params = InitializeParams {
        protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
        capabilities: capabilities.clone(),
        client_info,
    };
    let raw = serde_json::to_value(&params).map_err(Error::from)?;
    let result_value = peer.send_request(wire::INITIALIZE, Some(Value::from(raw)), None).await?;
    let result: InitializeResult = serde_json::from_value(result_value.into()).map_err(Error::from)?;

    let negotiated_version = negotiate_protocol_version(&result.protocol_version).to_string();
    peer.mark_initialized(capabilities, result.capabilities.clone(), negotiated_version).await;
    peer.send_notification(wire::NOTIFICATIONS_INITIALIZED, None).await?;

    Ok(result)
}

/// Server role: install the `initialize` request handler and the
/// `notifications/initialized` handler that together complete the
/// handshake. Returns a [`ServerHandshake`] the caller can await to learn
/// when a client has finished initializing (useful for gating background
/// work that should only start post-handshake).
pub async fn install_server_handshake(
    peer: &Peer,
    server_info: Implementation,
    capabilities: ServerCapabilities,
) -> ServerHandshake {
    let completed = Arc::new(Notify::new());

    let info = server_info.clone();
    let caps = capabilities.clone();
    let handshake_peer = peer.clone();
    peer.register_request_handler(wire::INITIALIZE, move |params: Option<Value>, _cx| {
        let info = info.clone();
        let caps = caps.clone();
        let handshake_peer = handshake_peer.clone();
        async move {
            let params = params.ok_or_else(|| Error::InvalidParams("initialize requires params".into()))?;
            let request: InitializeParams = serde_json::from_value(params.into()).map_err(Error::from)?;
            let negotiated_version = negotiate_protocol_version(&request.protocol_version).to_string();

            // `mark_initialized` runs here, ahead of the client's
            // `notifications/initialized`, so capability gating on
            // subsequent *inbound* requests is already active; the
            // `ServerHandshake::completed` signal still waits for the
            // notification to fire, since that's the point a client
            // commits to the session per the MCP handshake.
            handshake_peer
                .mark_initialized(request.capabilities, caps.clone(), negotiated_version.clone())
                .await;

            let result = InitializeResult {
                protocol_version: negotiated_version,
                capabilities: caps.clone(),
                server_info: info.clone(),
            };
            serde_json::to_value(&result).map(Value::from).map_err(Error::from)
        }
    })
    .await;

    let notify = completed.clone();
    peer.register_notification_handler(wire::NOTIFICATIONS_INITIALIZED, move |_params: Option<Value>| {
        let notify = notify.clone();
        async move {
            notify.notify_waiters();
        }
    })
    .await;

    if capabilities.logging.is_some() {
        peer.register_request_handler(wire::LOGGING_SET_LEVEL, |_params: Option<Value>, _cx| async move {
            Ok(Value::from(serde_json::Value::Object(Default::default())))
        })
        .await;
    }

    ServerHandshake { completed }
}

/// A signal the server side can await to know when a client has completed
/// the handshake (received an `InitializeResult` and sent back
/// `notifications/initialized`).
pub struct ServerHandshake {
    completed: Arc<Notify>,
}

impl ServerHandshake {
    /// Wait for the next `notifications/initialized`. A fresh `Peer` serves
    /// exactly one client connection in this runtime's session model (§7),
    /// so in practice this resolves once per peer's lifetime.
    pub async fn wait(&self) {
        self.completed.notified().await;
    }
}
