//! # LucentMCP
//!
//! Top-level facade over the MCP core runtime: the JSON-RPC peer engine,
//! capability negotiation, stdio/in-memory/HTTP transports, and the HTTP
//! session manager. Consumers reach for [`client`]/[`server`] for the
//! common connect/serve paths; the underlying crates (re-exported below)
//! remain available for anything more bespoke.

pub use lucentmcp_core::{
    install_server_handshake, perform_client_handshake, spawn_dispatch_loop, HandshakeMode, NotificationHandler, Peer,
    PeerConfig, RequestContext, RequestHandler, Role, ServerHandshake,
};
pub use lucentmcp_http as http;
pub use lucentmcp_protocol as protocol;
pub use lucentmcp_protocol::{Error, Result, Value};
pub use lucentmcp_transport as transport;
pub use lucentmcp_transport::{InMemoryTransport, StdioTransport, Transport};

pub mod client;
pub mod server;

pub mod prelude {
    pub use crate::client;
    pub use crate::server;
    pub use crate::{Error, HandshakeMode, Peer, PeerConfig, Result, Role, Value};
    pub use lucentmcp_protocol::capabilities::{ClientCapabilities, ServerCapabilities};
    pub use lucentmcp_protocol::initialize::Implementation;
}
