use thiserror::Error;

/// Crate-wide error type.
///
/// Authentication failure is deliberately not represented here: the auth
/// gate reports a mismatch as `false` so it stays side-effect free.
#[derive(Debug, Error)]
pub enum WikiError {
    #[error("page not found: {0}")]
    NotFound(String),

    #[error("file is not valid UTF-8: {0}")]
    Decode(String),

    #[error("page already exists: {0}")]
    Conflict(String),

    #[error("metadata field not set: {0}")]
    KeyNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("malformed config: {0}")]
    Config(#[from] serde_json::Error),
}
