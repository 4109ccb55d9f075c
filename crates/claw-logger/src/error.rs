//! Error types for the logging channels.

use thiserror::Error;

/// Errors that can occur while configuring or flushing log channels.
#[derive(Debug, Error)]
pub enum LogError {
    /// A required field was not provided.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A channel configuration value is unusable.
    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// One or more groups of a grouped flush could not be written.
    #[error("failed to write {failed} of {total} log groups")]
    GroupWrite {
        /// Number of groups whose write failed.
        failed: usize,
        /// Number of groups in the flush.
        total: usize,
    },

    /// The process-wide logger was already installed.
    #[error("logger already initialized")]
    AlreadyInitialized,

    /// The process-wide logger has not been installed.
    #[error("logger not initialized")]
    NotInitialized,
}

/// Result type alias for logger operations.
pub type Result<T> = std::result::Result<T, LogError>;
