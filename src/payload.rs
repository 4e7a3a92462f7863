//! Untyped payload values as they travel between the API and its callers.
//!
//! A [`Payload`] is a closed sum over JSON shapes plus [`Opaque`] values:
//! object-like data (timestamps, patterns) that carries its own meaning and
//! must never be walked as a key-value mapping.

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Sequence(Vec<Payload>),
    Mapping(Mapping),
    Opaque(Opaque),
}

/// Object-like values that are not plain data mappings.
#[derive(Debug, Clone)]
pub enum Opaque {
    Timestamp(DateTime<FixedOffset>),
    Pattern(Regex),
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Opaque::Timestamp(a), Opaque::Timestamp(b)) => a == b,
            (Opaque::Pattern(a), Opaque::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Opaque {
    /// Wire form of the value: RFC 3339 for timestamps, source for patterns.
    pub fn to_wire_string(&self) -> String {
        match self {
            Opaque::Timestamp(ts) => ts.to_rfc3339(),
            Opaque::Pattern(re) => re.as_str().to_string(),
        }
    }
}

/// String-keyed mapping that keeps keys in insertion order.
///
/// Inserting an existing key replaces its value in place, so the key keeps
/// the position of its first occurrence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: IndexMap<String, Payload>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Payload> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the previous value when `key` was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: Payload) -> Option<Payload> {
        self.entries.insert(key.into(), value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Payload)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }
}

impl FromIterator<(String, Payload)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, Payload)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Payload);
    type IntoIter = indexmap::map::IntoIter<String, Payload>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// True only for plain key-value data mappings.
///
/// Opaque values are object-like but are not mappings, and generic traversal
/// must leave them alone.
pub fn is_plain_data_object(value: &Payload) -> bool {
    matches!(value, Payload::Mapping(_))
}

impl Payload {
    /// Short name of the variant, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Null => "null",
            Payload::Bool(_) => "bool",
            Payload::Number(_) => "number",
            Payload::String(_) => "string",
            Payload::Sequence(_) => "sequence",
            Payload::Mapping(_) => "mapping",
            Payload::Opaque(Opaque::Timestamp(_)) => "timestamp",
            Payload::Opaque(Opaque::Pattern(_)) => "pattern",
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Payload::Mapping(m) => Some(m),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Payload::Null,
            serde_json::Value::Bool(b) => Payload::Bool(b),
            serde_json::Value::Number(n) => Payload::Number(n),
            serde_json::Value::String(s) => Payload::String(s),
            serde_json::Value::Array(arr) => {
                Payload::Sequence(arr.into_iter().map(Payload::from).collect())
            }
            serde_json::Value::Object(obj) => Payload::Mapping(
                obj.into_iter()
                    .map(|(k, v)| (k, Payload::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Payload> for serde_json::Value {
    fn from(value: Payload) -> Self {
        match value {
            Payload::Null => serde_json::Value::Null,
            Payload::Bool(b) => serde_json::Value::Bool(b),
            Payload::Number(n) => serde_json::Value::Number(n),
            Payload::String(s) => serde_json::Value::String(s),
            Payload::Sequence(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Payload::Mapping(mapping) => serde_json::Value::Object(
                mapping
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
            Payload::Opaque(opaque) => serde_json::Value::String(opaque.to_wire_string()),
        }
    }
}

impl From<DateTime<FixedOffset>> for Payload {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        Payload::Opaque(Opaque::Timestamp(ts))
    }
}

impl From<Regex> for Payload {
    fn from(re: Regex) -> Self {
        Payload::Opaque(Opaque::Pattern(re))
    }
}

impl From<Mapping> for Payload {
    fn from(mapping: Mapping) -> Self {
        Payload::Mapping(mapping)
    }
}

impl From<Vec<Payload>> for Payload {
    fn from(items: Vec<Payload>) -> Self {
        Payload::Sequence(items)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::String(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::String(s)
    }
}

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Payload::Bool(b)
    }
}

impl From<i64> for Payload {
    fn from(n: i64) -> Self {
        Payload::Number(n.into())
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Null => serializer.serialize_unit(),
            Payload::Bool(b) => serializer.serialize_bool(*b),
            Payload::Number(n) => n.serialize(serializer),
            Payload::String(s) => serializer.serialize_str(s),
            Payload::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Payload::Mapping(mapping) => {
                let mut map = serializer.serialize_map(Some(mapping.len()))?;
                for (k, v) in mapping.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Payload::Opaque(opaque) => serializer.serialize_str(&opaque.to_wire_string()),
        }
    }
}

// Deserialized input is plain JSON, so it never yields `Opaque`
impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Payload::from)
    }
}
