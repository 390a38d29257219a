//! The `gather` entry point.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use context_adapters::AdapterRegistry;
use context_cache::{CacheStats, ContextCache};
use context_session::SessionHistoryStore;
use context_storage::Storage;
use context_types::{ContextError, ContextItem, SessionSnapshot, Settings, Tier, Turn};

use crate::assembler::{Briefing, BriefingAssembler};
use crate::classifier::IntentClassifier;
use crate::error::EngineError;
use crate::escalation::EscalationPolicy;
use crate::router::{FanOut, SourceItems, TieredRouter};

/// Context-assembly engine.
///
/// One instance serves every session. Requests for the same session run one
/// at a time; requests for different sessions run independently.
pub struct ContextEngine {
    settings: Settings,
    classifier: IntentClassifier,
    policy: EscalationPolicy,
    router: TieredRouter,
    assembler: BriefingAssembler,
    registry: AdapterRegistry,
    cache: Arc<ContextCache>,
    sessions: Arc<SessionHistoryStore>,
}

impl ContextEngine {
    /// Assemble an engine from already-built parts.
    pub fn new(
        settings: Settings,
        registry: AdapterRegistry,
        cache: Arc<ContextCache>,
        sessions: Arc<SessionHistoryStore>,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(),
            policy: EscalationPolicy::new(settings.routing.clone()),
            router: TieredRouter::new(cache.clone(), settings.routing.clone()),
            assembler: BriefingAssembler::new(settings.briefing.clone()),
            settings,
            registry,
            cache,
            sessions,
        }
    }

    /// Open storage at `settings.db_path` and build an engine on top of it.
    ///
    /// The context cache is warmed from its persisted entries.
    pub fn open(settings: Settings, registry: AdapterRegistry) -> Result<Self, EngineError> {
        settings.validate()?;

        let storage = Arc::new(Storage::open(&settings.expanded_db_path())?);
        let cache = Arc::new(ContextCache::with_storage(
            settings.cache.clone(),
            storage.clone(),
        )?);
        let sessions = Arc::new(SessionHistoryStore::new(storage, settings.session.clone()));

        info!(
            adapters = registry.len(),
            cached_entries = cache.len(),
            "Context engine ready"
        );
        Ok(Self::new(settings, registry, cache, sessions))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ContextCache> {
        &self.cache
    }

    pub fn sessions(&self) -> &Arc<SessionHistoryStore> {
        &self.sessions
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Build the briefing for one user turn and record the turn.
    pub async fn gather(&self, session_id: &str, text: &str) -> Result<Briefing, EngineError> {
        self.gather_with_cancel(session_id, text, &CancellationToken::new())
            .await
    }

    /// [`gather`](Self::gather) that stops early when `cancel` fires.
    ///
    /// Outstanding adapter calls are cancelled and the turn is not recorded.
    pub async fn gather_with_cancel(
        &self,
        session_id: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Briefing, EngineError> {
        let started = Instant::now();
        let handle = self.sessions.session(session_id)?;
        let mut session = handle.lock().await;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let classification = self.classifier.classify(text);
        let decision = self
            .policy
            .decide(&classification, text, &session, &self.registry);

        let fan_out = if decision.tier.uses_adapters() {
            self.router
                .fan_out(
                    &decision.adapters,
                    text,
                    &classification.entities,
                    classification.intent,
                    decision.tier,
                    cancel,
                )
                .await
        } else {
            FanOut::default()
        };

        if fan_out.cancelled {
            info!(session_id, tier = %decision.tier, "Request cancelled");
            return Err(EngineError::Cancelled);
        }

        let mut items_by_source = fan_out.items_by_source.clone();
        match decision.tier {
            Tier::Hot => items_by_source.extend(group_by_source(session.context_items(false))),
            Tier::Slow => items_by_source.extend(group_by_source(session.context_items(true))),
            // No adapter serves this intent; the session is all there is
            Tier::Fast if decision.adapters.is_empty() => {
                items_by_source.extend(group_by_source(session.context_items(false)))
            }
            Tier::Fast => {}
        }

        let mut briefing = self
            .assembler
            .assemble(items_by_source, self.assembler.budget_items());
        briefing.session_id = session_id.to_string();
        briefing.query = text.to_string();
        briefing.intent = classification.intent;
        briefing.confidence = classification.confidence;
        briefing.competing = classification.competing;
        briefing.entities = classification.entities.clone();
        briefing.tier = decision.tier;
        briefing.escalation_reasons = decision.reasons;
        briefing.unavailable = fan_out.unavailable();
        briefing.sources = fan_out.reports.clone();

        let turn = Turn::new(text, classification.intent).with_tools(fan_out.attempted());
        self.sessions.add_turn(&mut session, turn)?;

        briefing.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            session_id,
            intent = %briefing.intent,
            tier = %briefing.tier,
            items = briefing.item_count(),
            unavailable = briefing.unavailable.len(),
            elapsed_ms = briefing.elapsed_ms,
            "Gathered context"
        );
        Ok(briefing)
    }

    /// End a session, writing its snapshot for later sessions.
    pub async fn close_session(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionSnapshot>, EngineError> {
        let snapshot = self.sessions.snapshot_and_close(session_id).await?;
        debug!(session_id, snapshot = snapshot.is_some(), "Closed session");
        Ok(snapshot)
    }
}

/// Bucket items by their `source`, keeping first-seen order.
fn group_by_source(items: Vec<ContextItem>) -> Vec<SourceItems> {
    let mut groups: Vec<SourceItems> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(source, _)| *source == item.source) {
            Some((_, bucket)) => bucket.push(item),
            None => groups.push((item.source.clone(), vec![item])),
        }
    }
    groups
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `settings.log_level` when set.
pub fn init_tracing(settings: &Settings) -> Result<(), EngineError> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ContextError::Config(format!("Failed to set tracing subscriber: {}", e)))?;
    Ok(())
}
