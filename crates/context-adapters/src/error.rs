//! Error types for adapter operations.

use context_types::ContextItem;
use thiserror::Error;

/// Errors an adapter can report.
///
/// None of these abort a request: the router records them as unavailable
/// sources in the briefing.
#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    /// The adapter ran out of budget. Items gathered so far are carried along.
    #[error("Timed out after returning {} partial items", partial.len())]
    Timeout { partial: Vec<ContextItem> },

    /// The adapter returned an explicit failure.
    #[error("Adapter failed: {0}")]
    Failed(String),

    /// The request was cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,

    /// Registration or configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    /// Create a failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Create a timeout carrying partial results.
    pub fn timeout(partial: Vec<ContextItem>) -> Self {
        Self::Timeout { partial }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Short reason recorded against an unavailable source.
    pub fn reason(&self) -> String {
        match self {
            Self::Timeout { partial } if partial.is_empty() => "timed out".to_string(),
            Self::Timeout { partial } => format!("timed out ({} partial items)", partial.len()),
            Self::Failed(message) => format!("error: {}", message),
            Self::Cancelled => "cancelled".to_string(),
            Self::Config(message) => format!("misconfigured: {}", message),
        }
    }
}
