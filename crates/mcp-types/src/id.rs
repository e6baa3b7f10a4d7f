//! Identifiers shared by the JSON-RPC message layer and the peer engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// A JSON-RPC request identifier: either a string or an integer. `null` is
/// intentionally not representable here — it is what distinguishes a
/// [`Request`](crate::envelope) from a [`Notification`](crate::envelope).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Integer(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Integer(i) => write!(f, "{i}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(v: i64) -> Self {
        RequestId::Integer(v)
    }
}

impl From<String> for RequestId {
    fn from(v: String) -> Self {
        RequestId::String(v)
    }
}

impl From<&str> for RequestId {
    fn from(v: &str) -> Self {
        RequestId::String(v.to_owned())
    }
}

/// Monotonic generator for client-originated request ids, one per peer.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    next: AtomicI64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self { next: AtomicI64::new(1) }
    }

    pub fn next(&self) -> RequestId {
        RequestId::Integer(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Opaque identifier tying follow-up `notifications/progress` messages to an
/// in-flight request. Shares the same string-or-integer shape as
/// [`RequestId`] but is kept as a distinct type: a progress token and a
/// request id are never interchangeable on the wire even though they decode
/// identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    String(String),
    Integer(i64),
}

impl fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressToken::String(s) => write!(f, "{s}"),
            ProgressToken::Integer(i) => write!(f, "{i}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_is_monotonic_and_never_reuses() {
        let gen = RequestIdGenerator::new();
        let a = gen.next();
        let b = gen.next();
        assert_ne!(a, b);
        if let (RequestId::Integer(a), RequestId::Integer(b)) = (a, b) {
            assert!(b > a);
        } else {
            panic!("expected integer ids");
        }
    }
}
