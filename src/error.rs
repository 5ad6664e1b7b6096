//! Common error types for trackforge

use thiserror::Error;

/// Common result type for trackforge operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Crate-level error type
///
/// Analyzer-internal failures never surface here; they degrade to "no result
/// for this item" inside the enrichment pipeline. This enum covers the errors
/// that must reach the caller: cache writes, configuration problems, and
/// first-contact remote store failures.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote track store error
    #[error("Remote store error: {0}")]
    Store(#[from] crate::services::remote_store::StoreError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
