//! A dynamically-typed JSON value that keeps the integer/double distinction
//! `serde_json::Value` blurs once a number round-trips through `f64`.
//!
//! Internally every [`Value`] still speaks `serde_json::Value` at the wire
//! boundary (decoding/encoding reuses `serde_json`'s parser), but construction
//! and inspection never lose the original numeric shape: a JSON `5` decodes to
//! `Value::Integer(5)`, a JSON `5.0` decodes to `Value::Double(5.0)`, and
//! encoding the two produces different bytes.

use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Recursive JSON value preserving the integer/double distinction.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Decode from canonical JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(bytes)?;
        Ok(Self::from_json(raw))
    }

    /// Encode to canonical JSON bytes (UTF-8, no trailing newline).
    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(raw: serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    // Fits in u64 but not i64: represent losslessly as a double,
                    // matching the "preserve where possible" contract.
                    Value::Double(u as f64)
                } else {
                    Value::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from_json).collect()),
            serde_json::Value::Object(o) => {
                Value::Object(o.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
            }
        }
    }

    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Integer(i) => serde_json::Value::Number(i.into()),
            Value::Double(d) => serde_json::Number::from_f64(d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(a) => serde_json::Value::Array(a.into_iter().map(Value::into_json).collect()),
            Value::Object(o) => {
                serde_json::Value::Object(o.into_iter().map(|(k, v)| (k, v.into_json())).collect())
            }
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<serde_json::Value> for Value {
    fn from(raw: serde_json::Value) -> Self {
        Value::from_json(raw)
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        v.into_json()
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(a) => {
                let mut seq = serializer.serialize_seq(Some(a.len()))?;
                for item in a {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(o) => {
                let mut map = serializer.serialize_map(Some(o.len()))?;
                for (k, v) in o {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Route through serde_json::Value so we inherit its number parsing
        // (distinguishing integers that don't fit i64 from true floats)
        // without duplicating a JSON grammar by hand.
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn preserves_integer_vs_double() {
        let v = Value::from_slice(br#"{"a":5,"b":5.0}"#).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.get("a"), Some(&Value::Integer(5)));
        assert_eq!(obj.get("b"), Some(&Value::Double(5.0)));
    }

    #[test]
    fn round_trip_is_stable() {
        let v = Value::from_slice(br#"{"x":[1,2.5,"s",null,true]}"#).unwrap();
        let bytes = v.to_vec().unwrap();
        let v2 = Value::from_slice(&bytes).unwrap();
        assert_eq!(v, v2);
    }
}
