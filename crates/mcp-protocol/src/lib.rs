//! # LucentMCP Protocol
//!
//! The JSON-RPC 2.0 message layer, error taxonomy, capability negotiation and
//! fixed wire vocabulary for the Model Context Protocol. This crate has no
//! transport or concurrency concerns — see `lucentmcp-core` for the peer
//! engine that drives it and `lucentmcp-transport`/`lucentmcp-http` for
//! concrete transports.

pub mod capabilities;
pub mod error;
pub mod initialize;
pub mod jsonrpc;
pub mod methods;

pub use error::{Error, Result};
pub use jsonrpc::{Decoded, Message, Meta, Notification, Request, Response, Shape};
pub use lucentmcp_types::{ProgressToken, RequestId, RequestIdGenerator, Value};
