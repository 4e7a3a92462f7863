use thiserror::Error;

/// Traversal faults raised by the checked [`Normalizer`](crate::Normalizer).
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("keys collide on `{key}` at {path}")]
    KeyCollision { key: String, path: String },

    #[error("nesting deeper than {limit} at {path}")]
    DepthExceeded { limit: usize, path: String },

    #[error("normalized payload does not match the requested shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors surfaced by the `keycase` command-line tool.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("no input files match {0}")]
    NoInput(String),

    #[error("--fallback is not valid JSON: {0}")]
    InvalidFallback(serde_json::Error),

    #[error("{source_name}:{line}: malformed JSON: {error}")]
    MalformedRecord {
        source_name: String,
        line: usize,
        error: serde_json::Error,
    },

    #[error("{source_name}:{line}: {error}")]
    Normalize {
        source_name: String,
        line: usize,
        error: NormalizeError,
    },

    #[error("failed to encode record: {0}")]
    Serialize(serde_json::Error),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
