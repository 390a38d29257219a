//! Fixture adapter returning canned items.
//!
//! Useful for wiring tests and for hosts that want to inject fixed context
//! (a pinned project README, a team glossary) through the normal fan-out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use context_types::{ContextItem, Intent};

use crate::adapter::{Adapter, FetchRequest};
use crate::error::AdapterError;

/// Adapter that serves a fixed list of items, optionally after a delay or
/// with a forced failure.
pub struct StaticAdapter {
    name: String,
    intents: Vec<Intent>,
    items: Vec<ContextItem>,
    partial: Vec<ContextItem>,
    delay: Option<Duration>,
    failure: Option<String>,
    cache_ttl: Option<Duration>,
    honours_deadline: bool,
    calls: AtomicUsize,
}

impl StaticAdapter {
    /// Create an adapter with no items.
    pub fn new(name: impl Into<String>, intents: &[Intent]) -> Self {
        Self {
            name: name.into(),
            intents: intents.to_vec(),
            items: Vec::new(),
            partial: Vec::new(),
            delay: None,
            failure: None,
            cache_ttl: None,
            honours_deadline: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Items returned on success.
    pub fn with_items(mut self, items: Vec<ContextItem>) -> Self {
        self.items = items;
        self
    }

    /// Items returned alongside a timeout.
    pub fn with_partial(mut self, items: Vec<ContextItem>) -> Self {
        self.partial = items;
        self
    }

    /// Simulated latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Always fail with `message`.
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Let the router cache results for `ttl`.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Keep sleeping past the deadline instead of returning a timeout.
    ///
    /// Models a misbehaving source the router has to abandon.
    pub fn ignoring_deadline(mut self) -> Self {
        self.honours_deadline = false;
        self
    }

    /// Number of times `fetch` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for StaticAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn eligible_intents(&self) -> &[Intent] {
        &self.intents
    }

    fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<ContextItem>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            if self.honours_deadline {
                tokio::select! {
                    biased;
                    _ = request.cancel.cancelled() => return Err(AdapterError::Cancelled),
                    _ = tokio::time::sleep_until(request.deadline) => {
                        return Err(AdapterError::timeout(self.partial.clone()));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            } else {
                tokio::time::sleep(delay).await;
            }
        }

        if let Some(message) = &self.failure {
            return Err(AdapterError::failed(message.clone()));
        }

        Ok(self.items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_types::ItemKind;

    fn item(title: &str) -> ContextItem {
        ContextItem::new("fixture", ItemKind::Note, title, "body").with_locator(title)
    }

    #[tokio::test]
    async fn test_returns_items_and_counts_calls() {
        let adapter = StaticAdapter::new("fixture", &[Intent::Research])
            .with_items(vec![item("a"), item("b")]);
        let request = FetchRequest::new("q", vec![], Duration::from_secs(1));

        assert_eq!(adapter.fetch(&request).await.unwrap().len(), 2);
        assert_eq!(adapter.fetch(&request).await.unwrap().len(), 2);
        assert_eq!(adapter.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure() {
        let adapter = StaticAdapter::new("fixture", &[]).with_failure("index offline");
        let request = FetchRequest::new("q", vec![], Duration::from_secs(1));

        let err = adapter.fetch(&request).await.unwrap_err();
        assert_eq!(err.reason(), "error: index offline");
    }

    #[tokio::test]
    async fn test_slow_adapter_times_out_with_partial() {
        let adapter = StaticAdapter::new("fixture", &[])
            .with_items(vec![item("full")])
            .with_partial(vec![item("partial")])
            .with_delay(Duration::from_millis(300));
        let request = FetchRequest::new("q", vec![], Duration::from_millis(30));

        match adapter.fetch(&request).await {
            Err(AdapterError::Timeout { partial }) => {
                assert_eq!(partial.len(), 1);
                assert_eq!(partial[0].title, "partial");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
