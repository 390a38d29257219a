//! Session continuity E2E tests.
//!
//! Turn logs, summaries and snapshots survive an engine restart, and a new
//! session starts with the snapshots of the sessions before it.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use context_adapters::AdapterRegistry;
use context_retrieval::SourceStatus;
use context_types::{Intent, ItemKind, Tier};
use e2e_tests::{fixture_adapter, standard_registry, TestHarness, DEBUG_REQUEST};

/// One turn with nothing extractable, then close: no snapshot is written.
#[tokio::test]
async fn test_close_without_extractions_writes_nothing() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    let engine = harness.engine(standard_registry());

    engine.gather("quiet", "memory stuff").await?;
    let snapshot = engine.close_session("quiet").await?;

    assert!(snapshot.is_none());
    assert!(engine.sessions().load_recent(5)?.is_empty());
    Ok(())
}

/// Closing a session that never saw a turn writes nothing either.
#[tokio::test]
async fn test_close_empty_session() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    let engine = harness.engine(standard_registry());

    assert!(engine.close_session("never-used").await?.is_none());
    Ok(())
}

/// A closed session's topics and decisions reach the next session's Slow briefings.
#[tokio::test]
async fn test_snapshot_feeds_next_session() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    let engine = harness.engine(standard_registry());

    engine.gather("monday", DEBUG_REQUEST).await?;
    engine
        .gather(
            "monday",
            "We decided to rotate the JWT signing key in src/auth/keys.rs.",
        )
        .await?;
    let snapshot = engine.close_session("monday").await?.unwrap();

    assert_eq!(snapshot.turn_count, 2);
    assert!(snapshot.topics.contains(&"authentication".to_string()));
    assert_eq!(
        snapshot.decisions,
        vec!["We decided to rotate the JWT signing key in src/auth/keys".to_string()]
    );
    assert_eq!(snapshot.files, vec!["src/auth/keys.rs".to_string()]);

    let briefing = engine
        .gather("tuesday", "What did we decide last session about the signing key?")
        .await?;
    assert_eq!(briefing.tier, Tier::Slow);

    let prior = briefing.section(ItemKind::PriorSession).unwrap();
    assert_eq!(prior.items.len(), 1);
    assert!(prior.items[0].body.contains("rotate the JWT signing key"));
    Ok(())
}

/// Snapshots are loaded newest first and capped at the configured count.
#[tokio::test]
async fn test_recent_snapshots_newest_first() -> anyhow::Result<()> {
    let harness = TestHarness::with_settings(|s| s.session.recent_sessions = 2);
    let engine = harness.engine(standard_registry());

    for id in ["s-1", "s-2", "s-3"] {
        engine
            .gather(id, &format!("Refactor the database layer for {}", id))
            .await?;
        engine.close_session(id).await?.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let ids: Vec<String> = engine
        .sessions()
        .load_recent(10)?
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert_eq!(ids, vec!["s-3", "s-2", "s-1"]);

    let session = engine.sessions().open_session("s-4")?;
    let prior: Vec<&str> = session
        .prior_snapshots()
        .iter()
        .map(|s| s.session_id.as_str())
        .collect();
    assert_eq!(prior, vec!["s-3", "s-2"]);
    Ok(())
}

/// Turn log, summary and rolling window survive a restart.
#[tokio::test]
async fn test_session_survives_restart() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    {
        let engine = harness.engine(standard_registry());
        engine.gather("durable", DEBUG_REQUEST).await?;
        engine
            .gather("durable", "Fix the token check in src/auth/jwt.rs")
            .await?;
    }

    let engine = harness.engine(standard_registry());
    let log = engine.sessions().turn_log("durable")?;
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].intent_type, Intent::Debugging);

    // The restored window still has a previous turn to continue from
    let briefing = engine.gather("durable", "yes, do it").await?;
    assert_eq!(briefing.tier, Tier::Hot);
    let summary = briefing
        .items()
        .find(|i| i.locator == "session:durable:summary")
        .unwrap();
    assert!(summary.body.contains("src/auth/jwt.rs"));
    Ok(())
}

fn cached_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry
        .register(Arc::new(
            fixture_adapter("search", ItemKind::CodeReference, 2, &[Intent::Debugging])
                .with_cache_ttl(Duration::from_secs(600)),
        ))
        .unwrap();
    registry
}

/// Router-cached adapter results are served after a restart without calling the adapter.
#[tokio::test]
async fn test_cached_results_survive_restart() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    {
        let engine = harness.engine(cached_registry());
        let briefing = engine.gather("warm-1", DEBUG_REQUEST).await?;
        assert_eq!(briefing.sources[0].status, SourceStatus::Ok);
    }

    let engine = harness.engine(cached_registry());
    let briefing = engine.gather("warm-2", DEBUG_REQUEST).await?;
    assert_eq!(briefing.sources[0].status, SourceStatus::Cached);
    assert_eq!(briefing.item_count(), 2);
    Ok(())
}
