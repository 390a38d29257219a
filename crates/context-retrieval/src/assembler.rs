//! Briefing assembly: dedupe, per-source ranking, round-robin selection.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use context_types::{BriefingSettings, ContextItem, Intent, ItemKind, Tier};

use crate::escalation::EscalationReason;
use crate::router::{SourceItems, SourceReport, UnavailableSource};

/// Items of one kind, in selection order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BriefingSection {
    pub kind: ItemKind,
    pub items: Vec<ContextItem>,
}

/// Bounded, deduplicated context handed to the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Briefing {
    pub session_id: String,

    /// Request text the briefing was built for
    pub query: String,

    pub intent: Intent,
    pub confidence: f32,
    pub competing: bool,
    pub entities: Vec<String>,
    pub tier: Tier,

    /// Why the request left the Fast tier, if it did
    pub escalation_reasons: Vec<EscalationReason>,

    /// Selected items grouped by kind
    pub sections: Vec<BriefingSection>,

    /// One report per adapter consulted
    pub sources: Vec<SourceReport>,

    /// Sources that did not respond; nothing they would have said is known
    pub unavailable: Vec<UnavailableSource>,

    /// Wall-clock time spent in `gather`
    pub elapsed_ms: u64,
}

impl Briefing {
    /// An empty briefing for `tier`.
    pub fn empty(tier: Tier) -> Self {
        Self {
            session_id: String::new(),
            query: String::new(),
            intent: Intent::Unknown,
            confidence: 0.0,
            competing: false,
            entities: Vec::new(),
            tier,
            escalation_reasons: Vec::new(),
            sections: Vec::new(),
            sources: Vec::new(),
            unavailable: Vec::new(),
            elapsed_ms: 0,
        }
    }

    /// Every selected item, section by section.
    pub fn items(&self) -> impl Iterator<Item = &ContextItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /// Whether any source failed to respond.
    pub fn has_uncertainties(&self) -> bool {
        !self.unavailable.is_empty()
    }

    pub fn section(&self, kind: ItemKind) -> Option<&BriefingSection> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Serialize for hosts that consume the structure rather than the text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Render as Markdown.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        lines.push("# Context Briefing".to_string());
        lines.push(String::new());
        let mut header = format!(
            "Intent: {} (confidence {:.2}) | Tier: {}",
            self.intent, self.confidence, self.tier
        );
        if !self.sources.is_empty() {
            let names: Vec<&str> = self.sources.iter().map(|s| s.name.as_str()).collect();
            header.push_str(&format!(" | Sources: {}", names.join(", ")));
        }
        header.push_str(&format!(" | {}ms", self.elapsed_ms));
        lines.push(header);

        if !self.escalation_reasons.is_empty() {
            let reasons: Vec<String> = self
                .escalation_reasons
                .iter()
                .map(|r| r.to_string())
                .collect();
            lines.push(format!("Escalated: {}", reasons.join("; ")));
        }

        if self.is_empty() {
            lines.push(String::new());
            lines.push("_No context found._".to_string());
        }

        for section in &self.sections {
            lines.push(String::new());
            lines.push(format!("## {}", section.kind.heading()));
            for item in &section.items {
                lines.push(String::new());
                lines.push(format!("### {}", item.title));
                lines.push(item.body.clone());
                if item.locator.is_empty() {
                    lines.push(format!("Source: {}", item.source));
                } else {
                    lines.push(format!("Source: {} | `{}`", item.source, item.locator));
                }
            }
        }

        if self.has_uncertainties() {
            lines.push(String::new());
            lines.push("## Uncertainties".to_string());
            lines.push(String::new());
            lines.push(
                "These sources did not respond; do not present what they would have provided as confirmed:"
                    .to_string(),
            );
            for source in &self.unavailable {
                lines.push(format!("- {}: {}", source.name, source.reason));
            }
        }

        lines.join("\n")
    }
}

/// Merges per-source results into a [`Briefing`].
#[derive(Debug, Clone)]
pub struct BriefingAssembler {
    settings: BriefingSettings,
}

impl BriefingAssembler {
    pub fn new(settings: BriefingSettings) -> Self {
        Self { settings }
    }

    pub fn budget_items(&self) -> usize {
        self.settings.budget_items
    }

    /// Build a briefing from at most `budget_items` of the given items.
    ///
    /// Routing metadata (intent, tier, unavailable sources) is left for the
    /// caller to fill in.
    pub fn assemble(&self, items_by_source: Vec<SourceItems>, budget_items: usize) -> Briefing {
        let selected = self.select(items_by_source, budget_items);

        let mut by_kind: BTreeMap<ItemKind, Vec<ContextItem>> = BTreeMap::new();
        for item in selected {
            by_kind.entry(item.kind).or_default().push(item);
        }

        let mut briefing = Briefing::empty(Tier::Fast);
        briefing.sections = by_kind
            .into_iter()
            .map(|(kind, items)| BriefingSection { kind, items })
            .collect();
        briefing
    }

    /// Pick up to `budget_items` items, taking turns across sources.
    ///
    /// Items with an empty body, a locator already taken, or the same
    /// normalized title from the same source are skipped. Within a source,
    /// higher scores go first.
    pub fn select(&self, items_by_source: Vec<SourceItems>, budget_items: usize) -> Vec<ContextItem> {
        let mut buckets: Vec<(String, Vec<ContextItem>)> = Vec::new();
        for (source, items) in items_by_source {
            match buckets.iter_mut().find(|(name, _)| *name == source) {
                Some((_, bucket)) => bucket.extend(items),
                None => buckets.push((source, items)),
            }
        }

        let mut queues: Vec<std::vec::IntoIter<ContextItem>> = buckets
            .into_iter()
            .map(|(_, mut items)| {
                items.retain(ContextItem::has_body);
                items.sort_by(|a, b| b.score.total_cmp(&a.score));
                items.into_iter()
            })
            .collect();

        let mut seen_locators: HashSet<String> = HashSet::new();
        let mut seen_titles: HashSet<String> = HashSet::new();
        let mut selected = Vec::with_capacity(budget_items);
        let mut skipped = 0usize;

        while selected.len() < budget_items {
            let mut progressed = false;
            for queue in queues.iter_mut() {
                if selected.len() >= budget_items {
                    break;
                }
                // Next item from this source that is not a duplicate
                for item in queue.by_ref() {
                    let title_key = title_key(&item);
                    let duplicate = (!item.locator.is_empty()
                        && seen_locators.contains(&item.locator))
                        || title_key
                            .as_ref()
                            .map(|k| seen_titles.contains(k))
                            .unwrap_or(false);
                    if duplicate {
                        skipped += 1;
                        continue;
                    }

                    if !item.locator.is_empty() {
                        seen_locators.insert(item.locator.clone());
                    }
                    if let Some(key) = title_key {
                        seen_titles.insert(key);
                    }
                    selected.push(self.clip(item));
                    progressed = true;
                    break;
                }
            }
            if !progressed {
                break;
            }
        }

        debug!(
            selected = selected.len(),
            duplicates = skipped,
            budget = budget_items,
            "Assembled briefing items"
        );
        selected
    }

    fn clip(&self, mut item: ContextItem) -> ContextItem {
        let max = self.settings.max_body_chars;
        if item.body.chars().count() > max {
            item.body = item.body.chars().take(max).collect::<String>() + "...";
        }
        item
    }
}

/// `source|normalized title`, or None for an untitled item.
fn title_key(item: &ContextItem) -> Option<String> {
    let normalized = item
        .title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if normalized.is_empty() {
        None
    } else {
        Some(format!("{}|{}", item.source, normalized))
    }
}
