//! Core transport trait and types (§2.3, §5).

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("connection closed: {0}")]
    ConnectionClosed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("receive failed: {0}")]
    ReceiveFailed(String),
    #[error("message exceeded size limit of {limit} bytes")]
    MessageTooLarge { limit: usize },
    #[error("io error: {0}")]
    Io(String),
    #[error("session expired: {0}")]
    SessionExpired(String),
}

impl From<TransportError> for lucentmcp_protocol::Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::SessionExpired(detail) => lucentmcp_protocol::Error::SessionExpired(detail),
            other => lucentmcp_protocol::Error::TransportError(other.to_string()),
        }
    }
}

/// A single inbound item produced by [`Transport::receive`]'s lazy sequence:
/// either a fully-read message, the end of the stream, or a transport error
/// (after which the reader task exits per §5).
#[derive(Debug, Clone)]
pub enum InboundItem {
    Message(Vec<u8>),
    Closed,
    Error(TransportError),
}

impl fmt::Display for InboundItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InboundItem::Message(bytes) => write!(f, "message({} bytes)", bytes.len()),
            InboundItem::Closed => write!(f, "closed"),
            InboundItem::Error(e) => write!(f, "error({e})"),
        }
    }
}

/// A duplex byte/message channel, per §2.3: `connect`, `disconnect`,
/// `send(bytes)`, and a receiver half that yields a lazy sequence of inbound
/// items. Implementors guarantee outbound writes complete in submission
/// order (§5).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the underlying connection. A transport that is already
    /// connected treats this as a no-op.
    async fn connect(&self) -> TransportResult<()>;

    /// Serialize and deliver a single envelope's bytes. Concurrent callers
    /// are serialized internally so a message is never interleaved with
    /// another on the wire.
    async fn send(&self, bytes: Vec<u8>) -> TransportResult<()>;

    /// Pull the next inbound item, blocking until one is available. Returns
    /// `Closed` exactly once, after which every subsequent call also
    /// returns `Closed`.
    async fn receive(&self) -> InboundItem;

    /// End the connection: the inbound sequence ends and `disconnect` is
    /// idempotent.
    async fn disconnect(&self) -> TransportResult<()>;

    /// Best-effort human-readable description for logging.
    fn name(&self) -> &'static str;
}
