use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::casing::{recase_key, KeyCase};
use crate::error::NormalizeError;
use crate::payload::{Mapping, Payload};

/// Deepest container nesting the checked path accepts. A document nested
/// exactly this deep still converts; one level more is a fault.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Recursive key re-casing that never fails.
///
/// Colliding keys resolve last-write-wins and are logged. There is no depth
/// limit; use [`Normalizer`] when input may be hostile.
pub trait NormalizeKeys {
    fn normalize_keys(&self, case: KeyCase) -> Self;

    fn to_camel_keys(&self) -> Self
    where
        Self: Sized,
    {
        self.normalize_keys(KeyCase::Camel)
    }

    fn to_pascal_keys(&self) -> Self
    where
        Self: Sized,
    {
        self.normalize_keys(KeyCase::Pascal)
    }
}

impl NormalizeKeys for Value {
    fn normalize_keys(&self, case: KeyCase) -> Value {
        match self {
            Value::Object(obj) => {
                let mut new_obj = Map::new();
                for (k, v) in obj {
                    let new_key = recase_key(k, case);
                    let new_value = v.normalize_keys(case);
                    if new_obj.insert(new_key, new_value).is_some() {
                        log::warn!("Key {:?} collides after {} re-casing, last value wins", k, case);
                    }
                }
                Value::Object(new_obj)
            }
            Value::Array(arr) => {
                let new_arr: Vec<Value> = arr.iter().map(|v| v.normalize_keys(case)).collect();
                Value::Array(new_arr)
            }
            _ => self.clone(),
        }
    }
}

impl NormalizeKeys for Payload {
    fn normalize_keys(&self, case: KeyCase) -> Payload {
        match self {
            Payload::Mapping(mapping) => {
                let mut new_mapping = Mapping::with_capacity(mapping.len());
                for (k, v) in mapping.iter() {
                    let new_key = recase_key(k, case);
                    let new_value = v.normalize_keys(case);
                    if new_mapping.insert(new_key, new_value).is_some() {
                        log::warn!("Key {:?} collides after {} re-casing, last value wins", k, case);
                    }
                }
                Payload::Mapping(new_mapping)
            }
            Payload::Sequence(items) => {
                Payload::Sequence(items.iter().map(|v| v.normalize_keys(case)).collect())
            }
            // Primitives and opaque values are copied, never walked
            _ => self.clone(),
        }
    }
}

impl<T: NormalizeKeys> NormalizeKeys for Option<T> {
    fn normalize_keys(&self, case: KeyCase) -> Option<T> {
        self.as_ref().map(|v| v.normalize_keys(case))
    }
}

/// PascalCase -> camelCase on every mapping key, recursively.
pub fn normalize_to_camel(value: &Payload) -> Payload {
    value.to_camel_keys()
}

/// camelCase -> PascalCase on every mapping key, recursively.
pub fn normalize_to_pascal(value: &Payload) -> Payload {
    value.to_pascal_keys()
}

/// What happens when two source keys re-case to the same key.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, clap::ValueEnum)]
pub enum CollisionPolicy {
    /// Last value wins; the key keeps its first position.
    #[default]
    Overwrite,
    /// First value wins; later duplicates are dropped.
    KeepFirst,
    /// Fail with [`NormalizeError::KeyCollision`].
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub case: KeyCase,
    pub collisions: CollisionPolicy,
    /// `None` disables the check.
    pub max_depth: Option<usize>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            case: KeyCase::Camel,
            collisions: CollisionPolicy::Overwrite,
            max_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }
}

/// Checked normalizer. Faults are returned as [`NormalizeError`] with the
/// JSON pointer of the offending container.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    options: NormalizeOptions,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    pub fn normalize(&self, value: &Payload) -> Result<Payload, NormalizeError> {
        let mut path = Vec::new();
        self.walk(value, &mut path, 0)
    }

    /// Normalize, then decode into a typed DTO.
    pub fn decode<T: DeserializeOwned>(&self, value: &Payload) -> Result<T, NormalizeError> {
        let normalized = Value::from(self.normalize(value)?);
        Ok(serde_json::from_value(normalized)?)
    }

    fn walk(
        &self,
        value: &Payload,
        path: &mut Vec<String>,
        depth: usize,
    ) -> Result<Payload, NormalizeError> {
        match value {
            Payload::Mapping(mapping) => {
                let depth = self.enter(path, depth)?;
                let mut new_mapping = Mapping::with_capacity(mapping.len());
                for (k, v) in mapping.iter() {
                    let new_key = recase_key(k, self.options.case);

                    path.push(k.to_string());
                    let new_value = self.walk(v, path, depth)?;
                    path.pop();

                    if !new_mapping.contains_key(&new_key) {
                        new_mapping.insert(new_key, new_value);
                        continue;
                    }
                    match self.options.collisions {
                        CollisionPolicy::Overwrite => {
                            log::warn!(
                                "Key {:?} at {} collides on {:?}, last value wins",
                                k,
                                pointer(path),
                                new_key
                            );
                            new_mapping.insert(new_key, new_value);
                        }
                        CollisionPolicy::KeepFirst => {
                            log::warn!(
                                "Key {:?} at {} collides on {:?}, dropping it",
                                k,
                                pointer(path),
                                new_key
                            );
                        }
                        CollisionPolicy::Reject => {
                            return Err(NormalizeError::KeyCollision {
                                key: new_key,
                                path: pointer(path),
                            });
                        }
                    }
                }
                Ok(Payload::Mapping(new_mapping))
            }
            Payload::Sequence(items) => {
                let depth = self.enter(path, depth)?;
                let mut new_items = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    path.push(i.to_string());
                    new_items.push(self.walk(item, path, depth)?);
                    path.pop();
                }
                Ok(Payload::Sequence(new_items))
            }
            _ => Ok(value.clone()),
        }
    }

    fn enter(&self, path: &[String], depth: usize) -> Result<usize, NormalizeError> {
        let depth = depth + 1;
        match self.options.max_depth {
            Some(limit) if depth > limit => Err(NormalizeError::DepthExceeded {
                limit,
                path: pointer(path),
            }),
            _ => Ok(depth),
        }
    }
}

// RFC 6901 pointer; the root is shown as "/"
fn pointer(path: &[String]) -> String {
    let mut out = String::new();
    for segment in path {
        out.push('/');
        out.push_str(&segment.replace('~', "~0").replace('/', "~1"));
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
