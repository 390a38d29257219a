//! Graceful degradation E2E tests.
//!
//! A slow, failing or cancelled adapter must never fail `gather`: it is
//! reported as an unavailable source and everything else still comes back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use context_adapters::AdapterRegistry;
use context_retrieval::{EngineError, SourceStatus};
use context_types::{Intent, ItemKind, Tier};
use e2e_tests::{fixture_adapter, TestHarness, DEBUG_REQUEST};

fn registry_with_memory(memory: context_adapters::StaticAdapter) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry
        .register(Arc::new(fixture_adapter(
            "search",
            ItemKind::CodeReference,
            3,
            &[Intent::Debugging],
        )))
        .unwrap();
    registry.register(Arc::new(memory)).unwrap();
    registry
}

/// An adapter taking 800ms against a 500ms Fast deadline contributes nothing
/// and is listed as unavailable; the other adapter's results still arrive.
#[tokio::test]
async fn test_late_adapter_marked_unavailable() {
    let harness = TestHarness::new();
    let memory = fixture_adapter("memory", ItemKind::Memory, 3, &[Intent::Debugging])
        .with_delay(Duration::from_millis(800));
    let engine = harness.engine(registry_with_memory(memory));

    let started = Instant::now();
    let briefing = engine.gather("degrade-late", DEBUG_REQUEST).await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(750));
    assert_eq!(briefing.tier, Tier::Fast);
    assert_eq!(briefing.items().filter(|i| i.source == "memory").count(), 0);
    assert_eq!(briefing.items().filter(|i| i.source == "search").count(), 3);

    let unavailable: Vec<&str> = briefing.unavailable.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(unavailable, vec!["memory"]);
    assert!(briefing.render().contains("## Uncertainties"));
}

/// An adapter that ignores its deadline is abandoned, not awaited.
#[tokio::test]
async fn test_runaway_adapter_abandoned() {
    let harness = TestHarness::new();
    let memory = fixture_adapter("memory", ItemKind::Memory, 3, &[Intent::Debugging])
        .with_delay(Duration::from_secs(30))
        .ignoring_deadline();
    let engine = harness.engine(registry_with_memory(memory));

    let started = Instant::now();
    let briefing = engine.gather("degrade-runaway", DEBUG_REQUEST).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(briefing.unavailable.len(), 1);
    assert_eq!(briefing.unavailable[0].reason, "timed out");
}

/// An explicit failure is recorded with its message, never as an empty success.
#[tokio::test]
async fn test_failing_adapter_recorded() {
    let harness = TestHarness::new();
    let memory = fixture_adapter("memory", ItemKind::Memory, 3, &[Intent::Debugging])
        .with_failure("index unavailable");
    let engine = harness.engine(registry_with_memory(memory));

    let briefing = engine.gather("degrade-fail", DEBUG_REQUEST).await.unwrap();

    let memory_report = briefing
        .sources
        .iter()
        .find(|s| s.name == "memory")
        .unwrap();
    assert_eq!(
        memory_report.status,
        SourceStatus::Unavailable {
            reason: "error: index unavailable".to_string()
        }
    );
    assert!(briefing.render().contains("- memory: error: index unavailable"));
}

/// Every adapter down still yields a briefing, with every source listed.
#[tokio::test]
async fn test_all_adapters_down() {
    let harness = TestHarness::new();
    let mut registry = AdapterRegistry::new();
    for name in ["search", "memory"] {
        registry
            .register(Arc::new(
                fixture_adapter(name, ItemKind::Note, 2, &[Intent::Debugging])
                    .with_failure("offline"),
            ))
            .unwrap();
    }
    let engine = harness.engine(registry);

    let briefing = engine.gather("degrade-all", DEBUG_REQUEST).await.unwrap();

    assert!(briefing.is_empty());
    assert_eq!(briefing.unavailable.len(), 2);
}

/// Cancelling mid-flight stops the request quickly and records no turn.
#[tokio::test]
async fn test_cancelled_gather() {
    let harness = TestHarness::new();
    let memory = fixture_adapter("memory", ItemKind::Memory, 3, &[Intent::Debugging])
        .with_delay(Duration::from_secs(3));
    let engine = harness.engine(registry_with_memory(memory));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = engine
        .gather_with_cancel("degrade-cancel", "memory stuff", &cancel)
        .await;

    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(engine.sessions().turn_log("degrade-cancel").unwrap().is_empty());
}
