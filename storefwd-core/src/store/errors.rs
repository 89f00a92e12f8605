/*
    errors.rs - Error types for the store subsystem

    Every failure a store operation can surface:
    - Contract validation
    - Caller arguments
    - Create/update/remove preconditions
    - Encoding
    - Transport (pool, dialing, commands)
*/

use thiserror::Error;

/// Errors that can occur in the store subsystem
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object failed create/update contract checks
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller-supplied argument is empty or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Create attempted against an existing ID
    #[error("Duplicate object: {0}")]
    Duplicate(String),

    /// Update/remove target does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialize/deserialize failure
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Codec produced a record without an ID
    #[error("No ID produced for encoded object")]
    EmptyId,

    /// Watched record kept changing under the operation
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    /// Connectivity or protocol failure from the underlying store
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Transport(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Transport(format!("Failed to get connection: {}", err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Encoding(err.to_string())
    }
}

impl StoreError {
    /// Short label used for error metrics
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "validation",
            StoreError::InvalidArgument(_) => "invalid_argument",
            StoreError::Duplicate(_) => "duplicate",
            StoreError::NotFound(_) => "not_found",
            StoreError::Encoding(_) => "encoding",
            StoreError::EmptyId => "empty_id",
            StoreError::Conflict(_) => "conflict",
            StoreError::Transport(_) => "transport",
        }
    }
}
