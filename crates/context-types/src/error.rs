//! Error types shared across the context engine.

use thiserror::Error;

/// Unified error type for shared context operations.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
