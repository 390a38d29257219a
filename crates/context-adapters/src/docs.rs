//! Documentation adapter with cached library resolution.
//!
//! Looking up documentation is two dependent calls: resolve a human library
//! name ("Tokio") to a canonical identifier, then fetch documentation for that
//! identifier. Both results go through the shared [`ContextCache`]:
//!
//! - `{name}:resolve|{library}` holds the canonical id (empty = unknown library)
//! - `{name}:docs|{canonical id} {topic}` holds the fetched items
//!
//! Two requests that mention the same library with different wording share
//! the resolve entry, so only the first pays for resolution.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use context_cache::{CacheKey, ContextCache};
use context_types::{ContextItem, Intent};
use tracing::{debug, warn};

use crate::adapter::{Adapter, FetchRequest};
use crate::error::AdapterError;

/// Upstream documentation service.
#[async_trait]
pub trait DocsSource: Send + Sync {
    /// Map a library name to its canonical identifier; None if unknown.
    async fn resolve(&self, library: &str) -> Result<Option<String>, AdapterError>;

    /// Fetch documentation for a canonical identifier, focused on `topic`.
    async fn docs(&self, library_id: &str, topic: &str) -> Result<Vec<ContextItem>, AdapterError>;
}

const DEFAULT_DOCS_INTENTS: &[Intent] = &[Intent::Implementation, Intent::Research];

/// Adapter that resolves entity names to libraries and fetches their docs.
pub struct DocsAdapter<S: DocsSource> {
    name: String,
    source: S,
    cache: Arc<ContextCache>,
    ttl: Duration,
    intents: Vec<Intent>,
    max_libraries: usize,
}

impl<S: DocsSource> DocsAdapter<S> {
    /// Create a docs adapter using the cache's default TTL.
    pub fn new(name: impl Into<String>, source: S, cache: Arc<ContextCache>) -> Self {
        let ttl = cache.default_ttl();
        Self {
            name: name.into(),
            source,
            cache,
            ttl,
            intents: DEFAULT_DOCS_INTENTS.to_vec(),
            max_libraries: 3,
        }
    }

    /// Set the TTL for resolve and docs entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the Fast-tier intents.
    pub fn with_intents(mut self, intents: &[Intent]) -> Self {
        self.intents = intents.to_vec();
        self
    }

    /// Most libraries whose docs are fetched per request.
    pub fn with_max_libraries(mut self, max: usize) -> Self {
        self.max_libraries = max.max(1);
        self
    }

    /// Resolve a library name, consulting the cache first.
    pub async fn resolve_cached(&self, library: &str) -> Result<Option<String>, AdapterError> {
        let key = CacheKey::new(&format!("{}:resolve", self.name), library);
        if let Some(id) = self.cache.get(&key) {
            debug!(library, "Library resolution served from cache");
            return Ok((!id.is_empty()).then_some(id));
        }

        let resolved = self.source.resolve(library).await?;
        self.cache
            .put(&key, resolved.clone().unwrap_or_default(), self.ttl);
        Ok(resolved)
    }

    /// Fetch docs for a canonical id, consulting the cache first.
    pub async fn docs_cached(
        &self,
        library_id: &str,
        topic: &str,
    ) -> Result<Vec<ContextItem>, AdapterError> {
        let key = CacheKey::new(
            &format!("{}:docs", self.name),
            &format!("{} {}", library_id, topic),
        );
        if let Some(items) = self.cache.get_items(&key) {
            return Ok(items);
        }

        let items = self.source.docs(library_id, topic).await?;
        self.cache.put_items(&key, &items, self.ttl);
        Ok(items)
    }

    /// Resolve `library` and fetch its docs; None if it is not a known library.
    async fn lookup(
        &self,
        library: &str,
        topic: &str,
    ) -> Result<Option<Vec<ContextItem>>, AdapterError> {
        match self.resolve_cached(library).await? {
            Some(id) => Ok(Some(self.docs_cached(&id, topic).await?)),
            None => Ok(None),
        }
    }

    /// Look up each library-like entity until `max_libraries` have resolved.
    ///
    /// Each lookup runs under the request deadline on its own, so docs already
    /// fetched for earlier libraries come back as partial results when a
    /// later one runs out of time.
    async fn gather(&self, request: &FetchRequest) -> Result<Vec<ContextItem>, AdapterError> {
        let mut items = Vec::new();
        let mut last_error = None;
        let mut resolved = 0;

        for library in request.entities.iter().filter(|e| is_library_name(e)) {
            if resolved >= self.max_libraries {
                break;
            }
            match request.step(self.lookup(library, &request.query)).await {
                Ok(Some(found)) => {
                    resolved += 1;
                    items.extend(found);
                }
                Ok(None) => {}
                Err(AdapterError::Timeout { .. }) => {
                    warn!(adapter = %self.name, library = %library, partial = items.len(), "Docs lookup ran out of time");
                    return Err(AdapterError::timeout(items));
                }
                Err(AdapterError::Cancelled) => return Err(AdapterError::Cancelled),
                Err(e) => {
                    warn!(adapter = %self.name, library = %library, error = %e, "Docs lookup failed");
                    resolved += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if items.is_empty() => Err(e),
            _ => Ok(items),
        }
    }
}

/// Paths, qualified names and phrases are never library names.
fn is_library_name(entity: &str) -> bool {
    !entity.is_empty()
        && !entity.contains('/')
        && !entity.contains("::")
        && !entity.contains(char::is_whitespace)
}

#[async_trait]
impl<S: DocsSource> Adapter for DocsAdapter<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn eligible_intents(&self) -> &[Intent] {
        &self.intents
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<ContextItem>, AdapterError> {
        self.gather(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_types::ItemKind;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        libraries: HashMap<String, String>,
        slow_ids: Vec<String>,
        resolve_calls: AtomicUsize,
        docs_calls: AtomicUsize,
    }

    impl CountingSource {
        fn with_library(mut self, name: &str, id: &str) -> Self {
            self.libraries.insert(name.to_string(), id.to_string());
            self
        }

        fn with_slow_docs(mut self, id: &str) -> Self {
            self.slow_ids.push(id.to_string());
            self
        }
    }

    #[async_trait]
    impl DocsSource for CountingSource {
        async fn resolve(&self, library: &str) -> Result<Option<String>, AdapterError> {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.libraries.get(&library.to_lowercase()).cloned())
        }

        async fn docs(
            &self,
            library_id: &str,
            topic: &str,
        ) -> Result<Vec<ContextItem>, AdapterError> {
            self.docs_calls.fetch_add(1, Ordering::SeqCst);
            if self.slow_ids.iter().any(|id| id == library_id) {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
            Ok(vec![ContextItem::new(
                "docs",
                ItemKind::ExternalDoc,
                format!("{} docs", library_id),
                format!("Documentation about {}", topic),
            )
            .with_locator(format!("https://docs.example/{}#{}", library_id, topic.len()))])
        }
    }

    fn adapter() -> DocsAdapter<CountingSource> {
        let source = CountingSource::default().with_library("tokio", "/tokio-rs/tokio");
        DocsAdapter::new("docs", source, Arc::new(ContextCache::with_defaults()))
    }

    fn request(query: &str, entities: &[&str]) -> FetchRequest {
        FetchRequest::new(
            query,
            entities.iter().map(|e| e.to_string()).collect(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_resolution_is_shared_across_surface_queries() {
        let adapter = adapter();

        let first = adapter
            .fetch(&request("how do I spawn a task with tokio", &["tokio"]))
            .await
            .unwrap();
        let second = adapter
            .fetch(&request("tokio select macro with a timeout", &["Tokio"]))
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(adapter.source.resolve_calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.source.docs_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_repeated_query_hits_docs_cache() {
        let adapter = adapter();
        let req = request("tokio spawn", &["tokio"]);

        adapter.fetch(&req).await.unwrap();
        adapter.fetch(&req).await.unwrap();

        assert_eq!(adapter.source.resolve_calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.source.docs_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_library_is_negatively_cached() {
        let adapter = adapter();

        let items = adapter
            .fetch(&request("what is auth.rs", &["auth.rs"]))
            .await
            .unwrap();
        assert!(items.is_empty());
        adapter
            .fetch(&request("open auth.rs", &["auth.rs"]))
            .await
            .unwrap();

        assert_eq!(adapter.source.resolve_calls.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.source.docs_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_cached_direct() {
        let adapter = adapter();
        assert_eq!(
            adapter.resolve_cached("tokio").await.unwrap(),
            Some("/tokio-rs/tokio".to_string())
        );
        assert_eq!(adapter.resolve_cached("left-pad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_library_found_after_other_entities() {
        let adapter = adapter();
        let entities = [
            "src/upload.rs",
            "retry_budget",
            "HttpClient::send",
            "parse_config",
            "UploadQueue",
            "tokio",
        ];

        let items = adapter
            .fetch(&request("why does the upload retry forever", &entities))
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "/tokio-rs/tokio docs");
        // Paths and qualified names are never sent for resolution
        assert_eq!(adapter.source.resolve_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_slow_library_keeps_earlier_docs() {
        let source = CountingSource::default()
            .with_library("tokio", "/tokio-rs/tokio")
            .with_library("serde", "/serde-rs/serde")
            .with_slow_docs("/serde-rs/serde");
        let adapter = DocsAdapter::new("docs", source, Arc::new(ContextCache::with_defaults()));
        let request = FetchRequest::new(
            "tokio and serde together",
            vec!["tokio".to_string(), "serde".to_string()],
            Duration::from_millis(300),
        );

        let result = adapter.fetch(&request).await;

        match result {
            Err(AdapterError::Timeout { partial }) => {
                assert_eq!(partial.len(), 1);
                assert_eq!(partial[0].title, "/tokio-rs/tokio docs");
            }
            other => panic!("expected a timeout with partial docs, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_lookup() {
        let adapter = adapter();
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let request = request("tokio", &["tokio"]).with_cancel(token);

        let result = adapter.fetch(&request).await;
        assert!(matches!(result, Err(AdapterError::Cancelled)));
    }
}
