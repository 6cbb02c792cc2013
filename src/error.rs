//! Error types for archeval
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in archeval
#[derive(Debug, Error)]
pub enum ArchevalError {
    /// Missing or invalid configuration (arguments, environment, config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Telemetry provider call failed
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// Model evaluation failed
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Message queue operation failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for archeval operations
pub type Result<T> = std::result::Result<T, ArchevalError>;
