//! Session store error types.

use thiserror::Error;

/// Errors that leave session state unreadable or unwritable.
///
/// These are the only failures the engine reports to its caller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] context_storage::StorageError),

    /// Persisted session state failed to decode
    #[error("Corrupt session state for {session_id}: {message}")]
    Corrupt { session_id: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    /// Create a corruption error.
    pub fn corrupt(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            session_id: session_id.into(),
            message: message.into(),
        }
    }
}
