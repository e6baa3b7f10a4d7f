//! Error taxonomy for the LucentMCP protocol and runtime.
//!
//! Every fallible operation in this crate family returns [`Error`]. Handler
//! exceptions that are one of these variants propagate to the wire verbatim
//! as the matching JSON-RPC error object; anything else is folded into
//! [`Error::Internal`] with the original detail logged and a redacted
//! message placed on the wire.

use lucentmcp_types::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC standard error codes.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// MCP-specific error codes.
pub const RESOURCE_NOT_FOUND: i32 = -32002;
pub const URL_ELICITATION_REQUIRED: i32 = -32042;

/// SDK-local runtime error codes.
pub const CONNECTION_CLOSED: i32 = -32000;
pub const REQUEST_TIMEOUT: i32 = -32001;
pub const TRANSPORT_ERROR: i32 = -32003;
pub const REQUEST_CANCELLED: i32 = -32004;
pub const SESSION_EXPIRED: i32 = -32005;

/// A typed protocol/runtime error. Each variant maps to exactly one numeric
/// JSON-RPC error code via [`Error::code`].
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum Error {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("URL elicitation required: {0}")]
    UrlElicitationRequired(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("request timed out after {0:?}")]
    RequestTimeout(std::time::Duration),

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("request cancelled: {0}")]
    RequestCancelled(String),

    #[error("session expired: {0}")]
    SessionExpired(String),
}

impl Error {
    pub fn code(&self) -> i32 {
        match self {
            Error::ParseError(_) => PARSE_ERROR,
            Error::InvalidRequest(_) => INVALID_REQUEST,
            Error::MethodNotFound(_) => METHOD_NOT_FOUND,
            Error::InvalidParams(_) => INVALID_PARAMS,
            Error::InternalError(_) => INTERNAL_ERROR,
            Error::ResourceNotFound(_) => RESOURCE_NOT_FOUND,
            Error::UrlElicitationRequired(_) => URL_ELICITATION_REQUIRED,
            Error::ConnectionClosed(_) => CONNECTION_CLOSED,
            Error::RequestTimeout(_) => REQUEST_TIMEOUT,
            Error::TransportError(_) => TRANSPORT_ERROR,
            Error::RequestCancelled(_) => REQUEST_CANCELLED,
            Error::SessionExpired(_) => SESSION_EXPIRED,
        }
    }

    /// Redact internal detail for errors that should never reach the wire
    /// verbatim (anything that started life as an uncaught handler panic).
    pub fn internal(detail: impl Into<String>) -> Self {
        Error::InternalError(detail.into())
    }

    /// Build the wire-level `JsonRpcError` object for this error.
    pub fn to_wire(&self) -> crate::jsonrpc::JsonRpcError {
        crate::jsonrpc::JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            data: None,
        }
    }

    /// Reconstruct a typed error from a wire error object, for the client
    /// side of a failed `send_request`.
    pub fn from_wire(err: &crate::jsonrpc::JsonRpcError) -> Self {
        match err.code {
            PARSE_ERROR => Error::ParseError(err.message.clone()),
            INVALID_REQUEST => Error::InvalidRequest(err.message.clone()),
            METHOD_NOT_FOUND => Error::MethodNotFound(err.message.clone()),
            INVALID_PARAMS => Error::InvalidParams(err.message.clone()),
            RESOURCE_NOT_FOUND => Error::ResourceNotFound(err.message.clone()),
            URL_ELICITATION_REQUIRED => Error::UrlElicitationRequired(err.message.clone()),
            CONNECTION_CLOSED => Error::ConnectionClosed(err.message.clone()),
            REQUEST_TIMEOUT => Error::RequestTimeout(std::time::Duration::default()),
            TRANSPORT_ERROR => Error::TransportError(err.message.clone()),
            REQUEST_CANCELLED => Error::RequestCancelled(err.message.clone()),
            SESSION_EXPIRED => Error::SessionExpired(err.message.clone()),
            _ => Error::InternalError(err.message.clone()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ParseError(e.to_string())
    }
}

/// Helper for handler authors: fail with `invalidParams` if a required
/// `Value` field is missing or of the wrong shape.
pub fn require_field<'a>(obj: &'a Value, field: &str) -> Result<&'a Value> {
    obj.as_object()
        .and_then(|m| m.get(field))
        .ok_or_else(|| Error::InvalidParams(format!("missing field `{field}`")))
}
