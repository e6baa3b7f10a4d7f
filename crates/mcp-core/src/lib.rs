//! # LucentMCP Core
//!
//! The bidirectional peer engine (§4.2): request/response correlation,
//! handler dispatch, capability gating, cancellation and progress. One
//! [`Peer`] serves both client and server roles — see [`Role`] — with the
//! `initialize` handshake and the transport reader loop layered on top in
//! [`handshake`] and [`dispatcher`].

mod context;
mod dispatcher;
mod handler;
mod handshake;
mod peer;

pub use context::RequestContext;
pub use dispatcher::spawn_dispatch_loop;
pub use handler::{NotificationHandler, RequestHandler};
pub use handshake::{install_server_handshake, perform_client_handshake, ServerHandshake};
pub use peer::{HandshakeMode, Peer, PeerConfig, Role};
