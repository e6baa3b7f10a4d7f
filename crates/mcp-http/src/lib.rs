//! # LucentMCP HTTP
//!
//! HTTP+SSE session transport (§4.5, §4.6): a framework-agnostic server
//! side with an `axum` adapter, a client side built on `reqwest` and
//! `eventsource-stream`, and the session manager (§4.7) that ties a
//! server's live sessions to their per-session transport.

mod axum_adapter;
mod client;
mod server;
mod session;

pub use axum_adapter::{router, AppState};
pub use client::{HttpClientConfig, HttpClientTransport};
pub use server::{
    handle_delete, handle_get, handle_post, DnsRebindingProtection, HTTPRequest, HTTPResponse, HandlerInstaller,
    HttpMethod, HttpSessionManager, HttpSessionTransport, ServerTransportConfig, MCP_PROTOCOL_VERSION_HEADER,
    MCP_SESSION_ID_HEADER,
};
pub use session::{generate_session_id, SessionManager};
