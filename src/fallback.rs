//! Best-effort normalization for callers that must not fail.
//!
//! A malformed payload degrades to a caller-supplied default. The fault is
//! logged and kept on the result, so the caller can still tell real data
//! from a substitute. Nothing here returns an error.

use serde::de::DeserializeOwned;

use crate::error::NormalizeError;
use crate::normalize::Normalizer;
use crate::payload::Payload;

#[derive(Debug)]
pub enum Normalized<T> {
    Converted(T),
    Fallback { value: T, error: NormalizeError },
}

impl<T> Normalized<T> {
    /// Swap in `fallback` when `result` is a fault.
    pub fn from_result(result: Result<T, NormalizeError>, fallback: T) -> Self {
        match result {
            Ok(value) => Normalized::Converted(value),
            Err(error) => {
                log::warn!("Normalization failed, using fallback: {}", error);
                Normalized::Fallback {
                    value: fallback,
                    error,
                }
            }
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Normalized::Fallback { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Normalized::Converted(value) | Normalized::Fallback { value, .. } => value,
        }
    }

    pub fn error(&self) -> Option<&NormalizeError> {
        match self {
            Normalized::Converted(_) => None,
            Normalized::Fallback { error, .. } => Some(error),
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Normalized::Converted(value) | Normalized::Fallback { value, .. } => value,
        }
    }
}

impl Normalizer {
    pub fn normalize_with_fallback(&self, value: &Payload, fallback: Payload) -> Normalized<Payload> {
        Normalized::from_result(self.normalize(value), fallback)
    }

    pub fn decode_with_fallback<T: DeserializeOwned>(&self, value: &Payload, fallback: T) -> Normalized<T> {
        Normalized::from_result(self.decode(value), fallback)
    }
}

/// Camel-case `value` with the default checked [`Normalizer`], or hand back
/// `fallback` if that fails.
pub fn normalize_with_fallback(value: &Payload, fallback: Payload) -> Normalized<Payload> {
    Normalizer::default().normalize_with_fallback(value, fallback)
}
