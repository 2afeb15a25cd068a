//! The canonical value model and its byte encoding.
//!
//! A `CanonicalValue` is a restricted JSON: integers only, keys held in a
//! `BTreeMap` so they always iterate sorted, and a distinct `Absent` variant.
//! The byte form is compact JSON where `Absent` is written as the reserved
//! object `{"$absent":true}`.  Keys starting with `$` are reserved, so no
//! record field can collide with the marker and omission can never be
//! confused with an explicit `null`.
//!
//! `parse` is the exact inverse of `encode` on its image, which is what makes
//! canonicalization idempotent through a parse round trip.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use probity_contracts::error::CanonicalizationError;

const ABSENT_KEY: &str = "$absent";
const RESERVED_PREFIX: char = '$';

/// One node of a canonical document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalValue {
    /// An optional field that has no value.
    Absent,
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<CanonicalValue>),
    Map(BTreeMap<String, CanonicalValue>),
}

impl From<bool> for CanonicalValue {
    fn from(v: bool) -> Self {
        CanonicalValue::Bool(v)
    }
}

impl From<i64> for CanonicalValue {
    fn from(v: i64) -> Self {
        CanonicalValue::Int(v)
    }
}

impl From<String> for CanonicalValue {
    fn from(v: String) -> Self {
        CanonicalValue::Str(v)
    }
}

impl From<&str> for CanonicalValue {
    fn from(v: &str) -> Self {
        CanonicalValue::Str(v.to_string())
    }
}

impl From<Vec<CanonicalValue>> for CanonicalValue {
    fn from(v: Vec<CanonicalValue>) -> Self {
        CanonicalValue::List(v)
    }
}

impl<T: Into<CanonicalValue>> From<Option<T>> for CanonicalValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CanonicalValue::Absent)
    }
}

/// Builder for `CanonicalValue::Map`.
#[derive(Debug, Default)]
pub struct CanonicalMap(BTreeMap<String, CanonicalValue>);

impl CanonicalMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: impl Into<CanonicalValue>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> CanonicalValue {
        CanonicalValue::Map(self.0)
    }
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Encode `value` as canonical bytes.
///
/// Fails only if a map key uses the reserved `$` prefix.
pub fn encode(value: &CanonicalValue) -> Result<Vec<u8>, CanonicalizationError> {
    let json = to_json(value)?;
    serde_json::to_vec(&json).map_err(|e| CanonicalizationError::Malformed {
        reason: e.to_string(),
    })
}

fn to_json(value: &CanonicalValue) -> Result<Value, CanonicalizationError> {
    Ok(match value {
        CanonicalValue::Absent => {
            let mut marker = Map::new();
            marker.insert(ABSENT_KEY.to_string(), Value::Bool(true));
            Value::Object(marker)
        }
        CanonicalValue::Null => Value::Null,
        CanonicalValue::Bool(b) => Value::Bool(*b),
        CanonicalValue::Int(i) => Value::from(*i),
        CanonicalValue::Str(s) => Value::String(s.clone()),
        CanonicalValue::List(items) => {
            Value::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        CanonicalValue::Map(fields) => {
            // BTreeMap iteration is sorted, so insertion order is key order
            // whether or not serde_json preserves insertion order.
            let mut object = Map::new();
            for (key, field) in fields {
                if key.starts_with(RESERVED_PREFIX) {
                    return Err(CanonicalizationError::ReservedKey { key: key.clone() });
                }
                object.insert(key.clone(), to_json(field)?);
            }
            Value::Object(object)
        }
    })
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse canonical bytes back into a `CanonicalValue`.
pub fn parse(bytes: &[u8]) -> Result<CanonicalValue, CanonicalizationError> {
    let json: Value = serde_json::from_slice(bytes).map_err(|e| CanonicalizationError::Malformed {
        reason: e.to_string(),
    })?;
    from_json(&json)
}

/// Convert an arbitrary JSON document into canonical form.
///
/// Non-integer numbers are rejected rather than rounded.
pub fn from_json(json: &Value) -> Result<CanonicalValue, CanonicalizationError> {
    Ok(match json {
        Value::Null => CanonicalValue::Null,
        Value::Bool(b) => CanonicalValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => CanonicalValue::Int(i),
            None => {
                return Err(CanonicalizationError::UnsupportedNumber {
                    value: n.to_string(),
                })
            }
        },
        Value::String(s) => CanonicalValue::Str(s.clone()),
        Value::Array(items) => {
            CanonicalValue::List(items.iter().map(from_json).collect::<Result<_, _>>()?)
        }
        Value::Object(object) => {
            if is_absent_marker(object) {
                return Ok(CanonicalValue::Absent);
            }
            let mut fields = BTreeMap::new();
            for (key, field) in object {
                if key.starts_with(RESERVED_PREFIX) {
                    return Err(CanonicalizationError::ReservedKey { key: key.clone() });
                }
                fields.insert(key.clone(), from_json(field)?);
            }
            CanonicalValue::Map(fields)
        }
    })
}

fn is_absent_marker(object: &Map<String, Value>) -> bool {
    object.len() == 1 && object.get(ABSENT_KEY) == Some(&Value::Bool(true))
}
