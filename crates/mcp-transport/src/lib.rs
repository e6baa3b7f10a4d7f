//! # LucentMCP Transport
//!
//! The transport abstraction (§2.3) and its two simplest concrete
//! implementations: line-delimited stdio (§4.3) and an in-memory paired
//! transport (§4.4). HTTP transports live in `lucentmcp-http`, which depends
//! on this crate for the shared [`Transport`] trait and [`TransportError`].

mod core;
mod memory;
mod stdio;

pub use crate::core::{InboundItem, Transport, TransportError, TransportResult};
pub use memory::InMemoryTransport;
pub use stdio::{StdioTransport, DEFAULT_MAX_LINE_BYTES};
