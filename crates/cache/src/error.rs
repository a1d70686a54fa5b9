use serde::Serialize;
use thiserror::Error;

/// Failure descriptor stored on a cache entry.
///
/// Kept as data so consumers can branch on it; the backend's message is
/// carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FetchError {
    #[error("{0}")]
    NetworkOrBackend(String),

    #[error("Failed to decode rows: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn message(&self) -> &str {
        match self {
            FetchError::NetworkOrBackend(msg) | FetchError::Decode(msg) => msg,
        }
    }
}
