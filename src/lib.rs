//! Key-case normalization for API payloads.
//!
//! The backend speaks `PascalCase` JSON and the frontend expects
//! `camelCase`; the two conventions differ only in the first character of
//! each key. This crate rewrites that character on every mapping key of a
//! payload, recursively, in either direction.
//!
//! ```
//! use keycase::{normalize_to_camel, Payload};
//! use serde_json::json;
//!
//! let raw = Payload::from(json!({ "TotalChildren": 5, "InvitationStatistics": { "ActiveChildren": 3 } }));
//! let normalized = normalize_to_camel(&raw);
//! assert_eq!(
//!     serde_json::Value::from(normalized),
//!     json!({ "totalChildren": 5, "invitationStatistics": { "activeChildren": 3 } })
//! );
//! ```

pub mod casing;
pub mod config;
pub mod error;
pub mod fallback;
pub mod normalize;
pub mod payload;
pub mod pipeline;

pub use casing::{recase_key, KeyCase};
pub use error::{CliError, NormalizeError};
pub use fallback::{normalize_with_fallback, Normalized};
pub use normalize::{
    normalize_to_camel, normalize_to_pascal, CollisionPolicy, NormalizeKeys, NormalizeOptions,
    Normalizer, DEFAULT_MAX_DEPTH,
};
pub use payload::{is_plain_data_object, Mapping, Opaque, Payload};
