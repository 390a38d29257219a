//! Adapter trait definition.
//!
//! The `Adapter` trait is the only contract between the engine and an
//! external data source.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use context_types::{ContextItem, Intent};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AdapterError;

/// One adapter invocation.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Raw request text
    pub query: String,

    /// Entities extracted by the classifier (file names, identifiers, libraries)
    pub entities: Vec<String>,

    /// Intent assigned by the classifier
    pub intent: Intent,

    /// Hard deadline; the adapter must return by then
    pub deadline: Instant,

    /// Fires when the caller abandons the request
    pub cancel: CancellationToken,
}

impl FetchRequest {
    /// Create a request with `budget` from now.
    pub fn new(query: impl Into<String>, entities: Vec<String>, budget: Duration) -> Self {
        Self {
            query: query.into(),
            entities,
            intent: Intent::Unknown,
            deadline: Instant::now() + budget,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the intent.
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }

    /// Set the deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the caller cancelled the request.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `work` but give up at the deadline or on cancellation.
    ///
    /// Adapters without their own partial-result handling can wrap their
    /// whole fetch in this.
    pub async fn within_budget<F>(&self, work: F) -> Result<Vec<ContextItem>, AdapterError>
    where
        F: Future<Output = Result<Vec<ContextItem>, AdapterError>>,
    {
        self.step(work).await
    }

    /// Run one step of a multi-step fetch under the request's deadline.
    ///
    /// On timeout the error carries no items; the caller attaches whatever
    /// earlier steps produced with [`AdapterError::timeout`].
    pub async fn step<T, F>(&self, work: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AdapterError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(AdapterError::timeout(Vec::new())),
            result = work => result,
        }
    }
}

/// Trait for context sources.
///
/// # Contract
///
/// - `fetch` returns by `request.deadline`. An adapter that cannot finish
///   returns `AdapterError::Timeout` with whatever it gathered so far.
/// - Implementations are called concurrently with other adapters and with
///   themselves for different requests.
/// - Side effects such as cache writes are idempotent under retry.
///
/// # Name
///
/// `name()` is a stable, lowercase identifier. It labels every item the
/// adapter produces, keys its cache entries, and is how the briefing reports
/// the adapter as unavailable.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Stable adapter identifier (e.g., "search", "tasks", "docs").
    fn name(&self) -> &str;

    /// Intents for which this adapter is queried on the Fast tier.
    ///
    /// Every adapter is queried on the Slow tier regardless.
    fn eligible_intents(&self) -> &[Intent];

    /// How long the router may cache this adapter's results per query.
    ///
    /// Default implementation returns None (results are not cached).
    fn cache_ttl(&self) -> Option<Duration> {
        None
    }

    /// Fetch context items for a request.
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<ContextItem>, AdapterError>;
}
