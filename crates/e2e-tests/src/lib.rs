//! End-to-end test infrastructure for the context engine.
//!
//! Provides a shared TestHarness, fixture adapters and canned requests for
//! E2E tests covering classify -> route -> fan-out -> assemble -> record.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use context_adapters::{AdapterError, AdapterRegistry, DocsSource, StaticAdapter};
use context_retrieval::ContextEngine;
use context_types::{ContextItem, Intent, ItemKind, Settings};

/// The debugging request used throughout the scenarios.
pub const DEBUG_REQUEST: &str =
    "Why is the authentication failing? I'm getting a 401 error on login.";

/// Shared test harness for E2E tests.
///
/// Owns the temp directory backing the engine's storage so an engine can be
/// dropped and reopened on the same data.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Settings pointing at the temp dir
    pub settings: Settings,
}

impl TestHarness {
    /// Create a new harness with default settings.
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    /// Create a harness, adjusting the default settings first.
    pub fn with_settings(adjust: impl FnOnce(&mut Settings)) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let mut settings = Settings {
            db_path: temp_dir.path().join("db").to_string_lossy().to_string(),
            ..Default::default()
        };
        adjust(&mut settings);

        Self {
            _temp_dir: temp_dir,
            settings,
        }
    }

    /// Open an engine on the harness storage.
    ///
    /// Only one engine may be open at a time; drop the previous one first.
    pub fn engine(&self, registry: AdapterRegistry) -> ContextEngine {
        ContextEngine::open(self.settings.clone(), registry).expect("Failed to open engine")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Create `count` items from `source`, scores descending from 0.9.
pub fn items(source: &str, kind: ItemKind, count: usize) -> Vec<ContextItem> {
    (0..count)
        .map(|i| {
            ContextItem::new(
                source,
                kind,
                format!("{} result {}", source, i),
                format!("Details for {} result {}", source, i),
            )
            .with_locator(format!("{}://{}", source, i))
            .with_score(0.9 - i as f32 * 0.1)
        })
        .collect()
}

/// Fixture adapter with the given items.
pub fn fixture_adapter(
    name: &str,
    kind: ItemKind,
    count: usize,
    intents: &[Intent],
) -> StaticAdapter {
    StaticAdapter::new(name, intents).with_items(items(name, kind, count))
}

/// Registry with four fixture sources, three items each.
///
/// | adapter | Fast-tier intents |
/// |---------|-------------------|
/// | search  | debugging, implementation |
/// | memory  | debugging, implementation, research |
/// | tasks   | implementation, planning |
/// | notes   | planning, research |
pub fn standard_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    let adapters = [
        fixture_adapter(
            "search",
            ItemKind::CodeReference,
            3,
            &[Intent::Debugging, Intent::Implementation],
        ),
        fixture_adapter(
            "memory",
            ItemKind::Memory,
            3,
            &[Intent::Debugging, Intent::Implementation, Intent::Research],
        ),
        fixture_adapter(
            "tasks",
            ItemKind::Task,
            3,
            &[Intent::Implementation, Intent::Planning],
        ),
        fixture_adapter("notes", ItemKind::Note, 3, &[Intent::Planning, Intent::Research]),
    ];
    for adapter in adapters {
        registry
            .register(Arc::new(adapter))
            .expect("Failed to register fixture adapter");
    }
    registry
}

/// A multi-part subsystem design request of exactly `words` words.
pub fn design_request(words: usize) -> String {
    let text = "We need to design a new synchronization subsystem for the desktop and \
        mobile clients. First, describe how offline edits should be queued locally and \
        replayed once connectivity returns, including how conflicts between two devices \
        editing the same document are detected and resolved. Second, propose the storage \
        layout for the change journal, how it is compacted, and how long entries are \
        retained before they can be garbage collected. Third, explain how the server \
        side should batch incoming changes, acknowledge them, and push notifications to \
        other subscribed devices without overwhelming slow connections. Fourth, outline \
        the failure modes we must tolerate, such as partial uploads, clock skew between \
        devices, duplicated deliveries, and a client that has been offline for several \
        weeks. Fifth, list the metrics and alerts we should add so operators can tell \
        when synchronization falls behind. Finally, suggest an incremental rollout plan \
        with clear milestones, what can ship behind a feature flag, and which parts \
        need a migration for existing users.";
    text.split_whitespace()
        .cycle()
        .take(words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Documentation service fixture with call counters.
///
/// Knows a fixed set of libraries; clones share the counters.
#[derive(Clone, Default)]
pub struct FixtureDocs {
    resolve_calls: Arc<AtomicUsize>,
    docs_calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl FixtureDocs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated upstream latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn docs_calls(&self) -> usize {
        self.docs_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DocsSource for FixtureDocs {
    async fn resolve(&self, library: &str) -> Result<Option<String>, AdapterError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let id = match library.to_lowercase().as_str() {
            "tokio" => Some("/tokio-rs/tokio"),
            "serde" => Some("/serde-rs/serde"),
            _ => None,
        };
        Ok(id.map(str::to_string))
    }

    async fn docs(&self, library_id: &str, topic: &str) -> Result<Vec<ContextItem>, AdapterError> {
        self.docs_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(vec![ContextItem::new(
            "docs",
            ItemKind::ExternalDoc,
            format!("{} reference", library_id),
            format!("Documentation for {} relevant to: {}", library_id, topic),
        )
        .with_locator(format!(
            "https://docs.example{}#{}",
            library_id,
            topic.split_whitespace().count()
        ))
        .with_score(0.7)])
    }
}
