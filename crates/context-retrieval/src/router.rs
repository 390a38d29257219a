//! Tiered router: concurrent adapter fan-out with a bounded wait.
//!
//! Each selected adapter runs in its own spawned task with a child
//! cancellation token. The router waits for every task until the tier
//! deadline, then cancels and aborts whatever is still running; results that
//! arrive later are dropped with the task. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use context_adapters::{AdapterError, FetchRequest, RegisteredAdapter};
use context_cache::{CacheKey, ContextCache};
use context_types::{ContextItem, Intent, RoutingSettings, Tier};

/// How much earlier than the router adapters are told to give up.
const HANDOFF_MARGIN: Duration = Duration::from_millis(25);

/// How one adapter call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    /// Fetched within the deadline
    Ok,
    /// Served from the context cache without calling the adapter
    Cached,
    /// Timed out, failed or was cancelled
    Unavailable { reason: String },
}

/// Per-adapter record kept for the briefing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub name: String,
    pub status: SourceStatus,
    /// Items contributed
    pub items: usize,
    pub elapsed_ms: u64,
}

impl SourceReport {
    pub fn is_available(&self) -> bool {
        !matches!(self.status, SourceStatus::Unavailable { .. })
    }
}

/// A source that did not answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableSource {
    pub name: String,
    pub reason: String,
}

/// Items grouped by the adapter that produced them.
pub type SourceItems = (String, Vec<ContextItem>);

/// Result of one fan-out.
#[derive(Debug, Clone, Default)]
pub struct FanOut {
    /// Items per source, in adapter order
    pub items_by_source: Vec<SourceItems>,

    /// One report per adapter attempted, in adapter order
    pub reports: Vec<SourceReport>,

    /// Whether the caller cancelled the request mid-flight
    pub cancelled: bool,
}

impl FanOut {
    /// Sources recorded as unavailable.
    pub fn unavailable(&self) -> Vec<UnavailableSource> {
        self.reports
            .iter()
            .filter_map(|r| match &r.status {
                SourceStatus::Unavailable { reason } => Some(UnavailableSource {
                    name: r.name.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Names of every adapter consulted, cached or not.
    pub fn attempted(&self) -> Vec<String> {
        self.reports.iter().map(|r| r.name.clone()).collect()
    }

    pub fn item_count(&self) -> usize {
        self.items_by_source.iter().map(|(_, items)| items.len()).sum()
    }
}

struct Pending {
    name: String,
    handle: JoinHandle<Result<Vec<ContextItem>, AdapterError>>,
    token: CancellationToken,
    started: Instant,
    cache: Option<(CacheKey, Duration)>,
}

/// Runs adapter fan-outs for the Fast and Slow tiers.
pub struct TieredRouter {
    cache: Arc<ContextCache>,
    settings: RoutingSettings,
}

impl TieredRouter {
    pub fn new(cache: Arc<ContextCache>, settings: RoutingSettings) -> Self {
        Self { cache, settings }
    }

    /// Deadline for the whole fan-out on `tier`.
    pub fn deadline_for(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Hot => Duration::ZERO,
            Tier::Fast => Duration::from_millis(self.settings.fast_deadline_ms),
            Tier::Slow => Duration::from_millis(self.settings.slow_deadline_ms),
        }
    }

    /// Query `adapters` concurrently and wait at most the tier deadline.
    ///
    /// Never fails: every adapter ends up with a report, and every one that
    /// did not answer is listed as unavailable.
    pub async fn fan_out(
        &self,
        adapters: &[RegisteredAdapter],
        query: &str,
        entities: &[String],
        intent: Intent,
        tier: Tier,
        cancel: &CancellationToken,
    ) -> FanOut {
        let now = Instant::now();
        let deadline = now + self.deadline_for(tier);
        // An adapter that stops at its own deadline still gets its partial
        // results back before the router stops waiting.
        let adapter_deadline = deadline.checked_sub(HANDOFF_MARGIN).unwrap_or(now).max(now);
        let mut slots: Vec<Option<(SourceReport, Vec<ContextItem>)>> = Vec::new();
        let mut pending = Vec::new();

        for registered in adapters {
            let name = registered.name().to_string();
            let cache = registered
                .cache_ttl
                .map(|ttl| (CacheKey::new(&name, query), ttl));

            if let Some((key, _)) = &cache {
                if let Some(items) = self.cache.get_items(key) {
                    debug!(adapter = %name, items = items.len(), "Adapter results served from cache");
                    let report = SourceReport {
                        name,
                        status: SourceStatus::Cached,
                        items: items.len(),
                        elapsed_ms: 0,
                    };
                    slots.push(Some((report, items)));
                    continue;
                }
            }

            let token = cancel.child_token();
            let request = FetchRequest::new(query, entities.to_vec(), Duration::ZERO)
                .with_intent(intent)
                .with_deadline(adapter_deadline)
                .with_cancel(token.clone());
            let adapter = registered.adapter.clone();
            let handle = tokio::spawn(async move { adapter.fetch(&request).await });

            slots.push(None);
            pending.push((
                slots.len() - 1,
                Pending {
                    name,
                    handle,
                    token,
                    started: Instant::now(),
                    cache,
                },
            ));
        }

        let waits = pending.into_iter().map(|(slot, p)| async move {
            (slot, self.collect(p, deadline, cancel).await)
        });
        for (slot, outcome) in join_all(waits).await {
            slots[slot] = Some(outcome);
        }

        let mut fan_out = FanOut {
            cancelled: cancel.is_cancelled(),
            ..Default::default()
        };
        for (report, items) in slots.into_iter().flatten() {
            if !items.is_empty() {
                fan_out.items_by_source.push((report.name.clone(), items));
            }
            fan_out.reports.push(report);
        }

        debug!(
            tier = %tier,
            adapters = fan_out.reports.len(),
            items = fan_out.item_count(),
            unavailable = fan_out.unavailable().len(),
            "Fan-out complete"
        );
        fan_out
    }

    async fn collect(
        &self,
        mut pending: Pending,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> (SourceReport, Vec<ContextItem>) {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AdapterError::Cancelled),
            joined = tokio::time::timeout_at(deadline, &mut pending.handle) => match joined {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(AdapterError::failed(format!("task failed: {}", join_err))),
                Err(_elapsed) => Err(AdapterError::timeout(Vec::new())),
            },
        };
        let elapsed_ms = pending.started.elapsed().as_millis() as u64;

        match outcome {
            Ok(items) => {
                if let Some((key, ttl)) = &pending.cache {
                    self.cache.put_items(key, &items, *ttl);
                }
                debug!(adapter = %pending.name, items = items.len(), elapsed_ms, "Adapter returned");
                let report = SourceReport {
                    name: pending.name,
                    status: SourceStatus::Ok,
                    items: items.len(),
                    elapsed_ms,
                };
                (report, items)
            }
            Err(err) => {
                // Abandon the call; a late result is dropped with the task
                pending.token.cancel();
                pending.handle.abort();

                warn!(adapter = %pending.name, reason = %err.reason(), elapsed_ms, "Adapter unavailable");
                let partial = match err {
                    AdapterError::Timeout { ref partial } => partial.clone(),
                    _ => Vec::new(),
                };
                let report = SourceReport {
                    name: pending.name,
                    status: SourceStatus::Unavailable {
                        reason: err.reason(),
                    },
                    items: partial.len(),
                    elapsed_ms,
                };
                (report, partial)
            }
        }
    }
}
