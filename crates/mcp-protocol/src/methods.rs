//! Fixed method/notification names (§6) and the method-descriptor contract
//! (§9: "the source's associated-type-per-method pattern maps to a tagged
//! registry keyed by method name").
//!
//! A concrete [`MethodDescriptor`] pairs a method name with a params type and
//! a result type. Decoding honors the `NotRequired` marker: if `params` is
//! absent on the wire and `P: NotRequired`, `P::default()` is used instead of
//! failing with `invalidParams`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use lucentmcp_types::Value;

pub mod wire {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";
    pub const NOTIFICATIONS_INITIALIZED: &str = "notifications/initialized";
    pub const NOTIFICATIONS_CANCELLED: &str = "notifications/cancelled";
    pub const NOTIFICATIONS_PROGRESS: &str = "notifications/progress";
    pub const NOTIFICATIONS_MESSAGE: &str = "notifications/message";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const NOTIFICATIONS_TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
    pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
    pub const NOTIFICATIONS_RESOURCES_UPDATED: &str = "notifications/resources/updated";
    pub const NOTIFICATIONS_RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
    pub const NOTIFICATIONS_PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
    pub const COMPLETION_COMPLETE: &str = "completion/complete";
    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
    pub const ELICITATION_CREATE: &str = "elicitation/create";
    pub const ROOTS_LIST: &str = "roots/list";
    pub const NOTIFICATIONS_ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";
}

/// Protocol versions this implementation understands, oldest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &["2024-11-05", "2025-03-26", "2025-06-18", "2025-11-25"];

/// Assumed protocol version when an HTTP request after `initialize` omits
/// `MCP-Protocol-Version` (§3, §6).
pub const DEFAULT_PROTOCOL_VERSION: &str = "2025-03-26";

/// Choose the negotiated protocol version for a client-requested version,
/// per §4.2: exact match if possible, else the nearest supported version.
/// "Nearest" is defined in §11 as: the highest supported version `<=`
/// requested, falling back to the lowest supported version if the request
/// predates everything we support.
pub fn negotiate_protocol_version(requested: &str) -> &'static str {
    if let Some(exact) = SUPPORTED_PROTOCOL_VERSIONS.iter().find(|v| **v == requested) {
        return exact;
    }
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .rev()
        .find(|v| **v <= requested)
        .copied()
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}

/// Marker trait for parameter types that may be omitted on the wire. A type
/// implementing this must supply a sensible default to decode into when
/// `params` is `None`.
pub trait NotRequired: Default {}

/// Wrapper carrying unknown top-level JSON fields alongside a strongly typed
/// result, satisfying the "round-trip unknown fields" contract in §4.1
/// without requiring every result type to hand-write the bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithExtraFields<T> {
    pub value: T,
    pub extra_fields: std::collections::BTreeMap<String, Value>,
}

impl<T: Serialize + DeserializeOwned> WithExtraFields<T> {
    pub fn decode(raw: Value) -> Result<Self> {
        let mut obj = raw
            .as_object()
            .cloned()
            .ok_or_else(|| Error::InvalidParams("expected a JSON object".into()))?;
        let typed_json = serde_json::to_value(&obj)
            .map_err(Error::from)?;
        let value: T = serde_json::from_value(typed_json).map_err(Error::from)?;
        // Determine which keys the typed struct actually consumed by
        // re-serializing it and diffing; anything left over is "extra".
        let consumed = serde_json::to_value(&value).map_err(Error::from)?;
        if let Some(consumed_obj) = consumed.as_object() {
            for key in consumed_obj.keys() {
                obj.remove(key);
            }
        }
        Ok(Self { value, extra_fields: obj })
    }

    pub fn encode(&self) -> Result<Value> {
        let mut map = serde_json::to_value(&self.value)
            .map_err(Error::from)?
            .as_object()
            .cloned()
            .ok_or_else(|| Error::InternalError("result type did not serialize to an object".into()))?;
        for (k, v) in &self.extra_fields {
            map.entry(k.clone()).or_insert_with(|| v.clone().into());
        }
        Ok(Value::from(serde_json::Value::Object(map)))
    }
}

/// A method descriptor pairs a fixed method name with its params/result
/// types. `P::default()` is used when params are omitted and `P: NotRequired`.
pub trait MethodDescriptor {
    type Params: DeserializeOwned + Serialize + Send + 'static;
    type Result: DeserializeOwned + Serialize + Send + 'static;

    const NAME: &'static str;
    const PARAMS_REQUIRED: bool = true;

    fn decode_params(raw: Option<Value>) -> Result<Self::Params>
    where
        Self::Params: Default,
    {
        match raw {
            Some(v) => serde_json::from_value(v.into()).map_err(Error::from),
            None if !Self::PARAMS_REQUIRED => Ok(Self::Params::default()),
            None => Err(Error::InvalidParams(format!("`{}` requires params", Self::NAME))),
        }
    }

    fn encode_result(result: &Self::Result) -> Result<Value> {
        serde_json::to_value(result).map(Value::from).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiates_exact_match() {
        assert_eq!(negotiate_protocol_version("2025-06-18"), "2025-06-18");
    }

    #[test]
    fn negotiates_nearest_older_version() {
        assert_eq!(negotiate_protocol_version("2025-09-01"), "2025-06-18");
    }

    #[test]
    fn negotiates_floor_for_ancient_request() {
        assert_eq!(negotiate_protocol_version("2020-01-01"), "2024-11-05");
    }
}
