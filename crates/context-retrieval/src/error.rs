//! Engine error types.

use thiserror::Error;

use context_session::SessionError;
use context_storage::StorageError;
use context_types::ContextError;

/// Errors `gather` reports to its caller.
///
/// Adapter failures never show up here; they are recorded in the briefing.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Session state is unreadable or could not be written
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Storage could not be opened
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid settings or logging setup
    #[error("Configuration error: {0}")]
    Config(#[from] ContextError),

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,
}
