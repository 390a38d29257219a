//! Tier routing E2E tests.
//!
//! Verify that requests reach the tier their classification calls for, and
//! that the Fast tier only consults the adapters eligible for the intent.

use pretty_assertions::assert_eq;

use context_retrieval::{EscalationReason, IntentClassifier};
use context_types::{Intent, Tier};
use e2e_tests::{design_request, standard_registry, TestHarness, DEBUG_REQUEST};

/// A confident debugging request goes Fast and consults search and memory.
#[tokio::test]
async fn test_debugging_request_fast_tier() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    let engine = harness.engine(standard_registry());

    let briefing = engine.gather("routing-debug", DEBUG_REQUEST).await?;

    assert_eq!(briefing.intent, Intent::Debugging);
    assert!(
        briefing.confidence >= 0.7,
        "confidence {} should be >= 0.7",
        briefing.confidence
    );
    assert_eq!(briefing.tier, Tier::Fast);

    let consulted: Vec<&str> = briefing.sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(consulted, vec!["search", "memory"]);
    assert!(briefing.items().any(|i| i.source == "search"));
    assert!(briefing.items().any(|i| i.source == "memory"));
    Ok(())
}

/// A 250-word multi-part design request goes Slow and consults everything.
#[tokio::test]
async fn test_long_design_request_slow_tier() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    let engine = harness.engine(standard_registry());
    let request = design_request(250);
    assert_eq!(request.split_whitespace().count(), 250);

    let briefing = engine.gather("routing-design", &request).await?;

    assert_eq!(briefing.tier, Tier::Slow);
    assert!(briefing
        .escalation_reasons
        .contains(&EscalationReason::LongRequest { words: 250 }));
    assert_eq!(briefing.sources.len(), 4);
    Ok(())
}

/// Confident, single-intent, short requests never go Slow.
#[tokio::test]
async fn test_confident_requests_never_slow() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    let engine = harness.engine(standard_registry());
    let classifier = IntentClassifier::new();

    let requests = [
        DEBUG_REQUEST,
        "The upload crashes with a panic and a stack trace after the retry",
        "Implement retries and add a feature flag for uploads",
        "What is the difference between Arc and Rc?",
        "Explain the documentation for the config loader",
    ];

    for (i, request) in requests.iter().enumerate() {
        let classification = classifier.classify(request);
        assert!(classification.confidence >= 0.7, "{}", request);
        assert!(!classification.competing, "{}", request);

        let briefing = engine.gather(&format!("confident-{}", i), request).await?;
        assert!(
            briefing.tier != Tier::Slow,
            "{} went Slow: {:?}",
            request,
            briefing.escalation_reasons
        );
    }
    Ok(())
}

/// Competing intents always go Slow.
#[tokio::test]
async fn test_competing_requests_always_slow() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    let engine = harness.engine(standard_registry());
    let classifier = IntentClassifier::new();

    let requests = [
        "Check the docs for this error",
        "add the docs",
        "docs for the bug",
    ];

    for (i, request) in requests.iter().enumerate() {
        assert!(classifier.classify(request).competing, "{}", request);

        let briefing = engine.gather(&format!("competing-{}", i), request).await?;
        assert_eq!(briefing.tier, Tier::Slow, "{}", request);
        assert!(briefing
            .escalation_reasons
            .iter()
            .any(|r| matches!(r, EscalationReason::Competing { .. })));
    }
    Ok(())
}

/// A short confirmation after a turn is answered from session state alone.
#[tokio::test]
async fn test_continuation_hot_tier() -> anyhow::Result<()> {
    let harness = TestHarness::new();
    let engine = harness.engine(standard_registry());

    engine.gather("routing-hot", DEBUG_REQUEST).await?;
    let briefing = engine.gather("routing-hot", "ok, continue").await?;

    assert_eq!(briefing.tier, Tier::Hot);
    assert!(briefing.sources.is_empty());
    assert!(!briefing.is_empty());
    assert!(briefing.items().all(|i| i.source == "session"));
    Ok(())
}
