//! JSON-RPC 2.0 envelopes with MCP's `_meta` extension and unknown-field
//! preservation on results.

use lucentmcp_types::{ProgressToken, RequestId, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Error;

pub const JSONRPC_VERSION: &str = "2.0";

/// `_meta` bag attached to params/notifications/results. Carries the
/// progress token when present; unknown keys are preserved verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(rename = "progressToken", skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<ProgressToken>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Meta {
    pub fn is_empty(&self) -> bool {
        self.progress_token.is_none() && self.extra.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<&Error> for JsonRpcError {
    fn from(e: &Error) -> Self {
        e.to_wire()
    }
}

/// A single JSON-RPC request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: JsonRpcVersionTag,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// A single JSON-RPC notification envelope (no `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: JsonRpcVersionTag,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// A single JSON-RPC response envelope; success and error are mutually
/// exclusive by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: JsonRpcVersionTag,
    pub id: RequestId,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Success {
        result: Value,
        #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
        meta: Option<Meta>,
    },
    Error {
        error: JsonRpcError,
    },
}

/// Marker type whose (de)serialization enforces `"jsonrpc":"2.0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonRpcVersionTag;

impl Serialize for JsonRpcVersionTag {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersionTag {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        if s == JSONRPC_VERSION {
            Ok(JsonRpcVersionTag)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version `{s}`, expected `{JSONRPC_VERSION}`"
            )))
        }
    }
}

impl Request {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self { jsonrpc: JsonRpcVersionTag, id, method: method.into(), params, meta: None }
    }
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self { jsonrpc: JsonRpcVersionTag, method: method.into(), params, meta: None }
    }
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self { jsonrpc: JsonRpcVersionTag, id, payload: ResponsePayload::Success { result, meta: None } }
    }

    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self { jsonrpc: JsonRpcVersionTag, id, payload: ResponsePayload::Error { error } }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.payload, ResponsePayload::Success { .. })
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Success { result, .. } => Some(result),
            ResponsePayload::Error { .. } => None,
        }
    }

    pub fn into_result(self) -> crate::error::Result<Value> {
        match self.payload {
            ResponsePayload::Success { result, .. } => Ok(result),
            ResponsePayload::Error { error } => Err(Error::from_wire(&error)),
        }
    }
}

/// A decoded JSON-RPC message, including the batch shapes from §4.1: an HTTP
/// POST body is either a single envelope or a batch array.
#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
    Batch(Vec<Message>),
}

/// Result of attempting to decode bytes off the wire. A bare parse failure
/// that cannot even be classified as request-shaped or response-shaped
/// carries no recoverable information beyond the error itself.
pub enum Decoded {
    Message(Message),
    ParseError { error: Error, shape: Shape },
}

/// What a payload that failed strict decoding still *looked like*, enough
/// for the peer engine to decide between "drop silently" and "reply -32700"
/// (§4.2 inbound dispatch step 1).
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Not even a JSON object/array — nothing to classify.
    Unknown,
    /// Has `result` or `error` — looks like a response.
    ResponseLike,
    /// Has `method`; carries the request id if one was present and decodable.
    RequestLike(Option<RequestId>),
}

/// Decode a single JSON-RPC envelope or a batch array from raw bytes.
///
/// Per §4.1: if an envelope fails full validation but *parses* as a
/// response-shaped or request-shaped object, callers can still classify it
/// (dropped silently if response-shaped, replied to with -32700 if
/// request-shaped). This function performs the classification; the peer
/// engine (see `lucentmcp-core`) decides what to do with each case.
pub fn decode(bytes: &[u8]) -> Decoded {
    let raw: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => return Decoded::ParseError { error: Error::ParseError(e.to_string()), shape: Shape::Unknown },
    };

    match decode_value(raw.clone()) {
        Ok(msg) => Decoded::Message(msg),
        Err(e) => Decoded::ParseError { error: e, shape: classify(&raw) },
    }
}

fn classify(raw: &serde_json::Value) -> Shape {
    let Some(map) = raw.as_object() else { return Shape::Unknown };
    if map.contains_key("result") || map.contains_key("error") {
        return Shape::ResponseLike;
    }
    if map.contains_key("method") {
        let id = map
            .get("id")
            .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok());
        return Shape::RequestLike(id);
    }
    Shape::Unknown
}

fn decode_value(raw: serde_json::Value) -> crate::error::Result<Message> {
    match raw {
        serde_json::Value::Array(items) => {
            if items.is_empty() {
                return Err(Error::InvalidRequest("empty batch".into()));
            }
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(decode_value(item)?);
            }
            Ok(Message::Batch(out))
        }
        serde_json::Value::Object(ref map) => {
            if map.contains_key("method") {
                if map.contains_key("id") {
                    let req: Request = serde_json::from_value(raw)?;
                    Ok(Message::Request(req))
                } else {
                    let note: Notification = serde_json::from_value(raw)?;
                    Ok(Message::Notification(note))
                }
            } else if map.contains_key("result") || map.contains_key("error") {
                let resp: Response = serde_json::from_value(raw)?;
                Ok(Message::Response(resp))
            } else {
                Err(Error::InvalidRequest("envelope has neither `method` nor `result`/`error`".into()))
            }
        }
        _ => Err(Error::InvalidRequest("envelope must be an object or array".into())),
    }
}

/// Encode any envelope to canonical, newline-free UTF-8 JSON bytes.
pub fn encode<T: Serialize>(envelope: &T) -> crate::error::Result<Vec<u8>> {
    serde_json::to_vec(envelope).map_err(Error::from)
}

impl Message {
    /// Encode this message back to wire bytes, preserving single-vs-batch shape.
    pub fn encode(&self) -> crate::error::Result<Vec<u8>> {
        match self {
            Message::Request(r) => encode(r),
            Message::Response(r) => encode(r),
            Message::Notification(n) => encode(n),
            Message::Batch(items) => {
                let values: crate::error::Result<Vec<serde_json::Value>> = items
                    .iter()
                    .map(|m| serde_json::to_value(EncodableRef(m)).map_err(Error::from))
                    .collect();
                Ok(serde_json::to_vec(&values?)?)
            }
        }
    }
}

/// Helper newtype so a nested `Message` inside a batch serializes as its
/// underlying envelope rather than through a tagged enum representation.
struct EncodableRef<'a>(&'a Message);

impl Serialize for EncodableRef<'_> {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Message::Request(r) => r.serialize(s),
            Message::Response(r) => r.serialize(s),
            Message::Notification(n) => n.serialize(s),
            Message::Batch(items) => items.iter().map(EncodableRef).collect::<Vec<_>>().serialize(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_single_request() {
        let bytes = br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        match decode(bytes) {
            Decoded::Message(Message::Request(r)) => {
                assert_eq!(r.method, "ping");
                assert_eq!(r.id, RequestId::Integer(1));
            }
            _ => panic!("expected a request"),
        }
    }

    #[test]
    fn decodes_notification_without_id() {
        let bytes = br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        match decode(bytes) {
            Decoded::Message(Message::Notification(n)) => assert_eq!(n.method, "notifications/initialized"),
            _ => panic!("expected a notification"),
        }
    }

    #[test]
    fn decodes_batch_preserving_order() {
        let bytes = br#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"jsonrpc":"2.0","id":2,"method":"ping"}]"#;
        match decode(bytes) {
            Decoded::Message(Message::Batch(items)) => assert_eq!(items.len(), 2),
            _ => panic!("expected a batch"),
        }
    }

    #[test]
    fn rejects_envelope_missing_discriminators() {
        let bytes = br#"{"jsonrpc":"2.0"}"#;
        match decode(bytes) {
            Decoded::ParseError { error: Error::InvalidRequest(_), shape: Shape::Unknown } => {}
            _ => panic!("expected invalid request"),
        }
    }

    #[test]
    fn success_response_round_trips_unknown_fields() {
        let bytes = br#"{"jsonrpc":"2.0","id":1,"result":{"tools":[],"extra":"kept"}}"#;
        let Decoded::Message(Message::Response(resp)) = decode(bytes) else {
            panic!("expected response")
        };
        let re_encoded = resp.encode_single().unwrap();
        let original: serde_json::Value = serde_json::from_slice(bytes).unwrap();
        let round_tripped: serde_json::Value = serde_json::from_slice(&re_encoded).unwrap();
        assert_eq!(original, round_tripped);
    }
}

impl Response {
    fn encode_single(&self) -> crate::error::Result<Vec<u8>> {
        encode(self)
    }
}
