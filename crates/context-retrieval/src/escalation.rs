//! Tier escalation policy.
//!
//! Rules are evaluated in precedence order:
//!
//! 1. A short continuation of the immediately preceding turn goes to Hot.
//! 2. Any structural doubt goes to Slow: low confidence, competing intents,
//!    many entities, explicit references to session history, planning
//!    requests, long requests, or several independent asks.
//! 3. Everything else goes to Fast.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use context_adapters::{AdapterRegistry, RegisteredAdapter};
use context_session::Session;
use context_types::{Intent, RoutingSettings, Tier};

use crate::classifier::ClassificationResult;

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(_compile_err) => match Regex::new(r"$^") {
            Ok(never) => never,
            Err(fallback_err) => panic!("hardcoded fallback regex must compile: {fallback_err}"),
        },
    }
}

static HISTORY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(
        r"(?i)\b(?:earlier|previously|last time|last session|previous session|yesterday|we discussed|we decided|you said|as before|like before|remember when|conversation history)\b",
    )
});
static ENUMERATED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"(?m)^\s*(?:\d+[.)]|[-*])\s+\S"));

/// Why a request did not take the Fast tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EscalationReason {
    /// Short follow-up to the previous turn
    Continuation,
    LowConfidence { confidence: f32 },
    Competing { first: Intent, second: Intent },
    ManyEntities { count: usize },
    HistoryReference { phrase: String },
    Planning,
    LongRequest { words: usize },
    MultipleAsks { count: usize },
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continuation => write!(f, "continuation of the previous turn"),
            Self::LowConfidence { confidence } => {
                write!(f, "low classification confidence ({:.2})", confidence)
            }
            Self::Competing { first, second } => {
                write!(f, "competing intents ({} vs {})", first, second)
            }
            Self::ManyEntities { count } => write!(f, "{} entities mentioned", count),
            Self::HistoryReference { phrase } => {
                write!(f, "references session history (\"{}\")", phrase)
            }
            Self::Planning => write!(f, "planning request"),
            Self::LongRequest { words } => write!(f, "long request ({} words)", words),
            Self::MultipleAsks { count } => write!(f, "{} separate asks", count),
        }
    }
}

/// Tier chosen for one request.
#[derive(Debug, Clone)]
pub struct TierDecision {
    pub tier: Tier,

    /// Rules that fired; empty for a plain Fast request
    pub reasons: Vec<EscalationReason>,

    /// Adapters to query, in registration order
    pub adapters: Vec<RegisteredAdapter>,
}

impl TierDecision {
    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }
}

/// Deterministic tier selection.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    settings: RoutingSettings,
}

impl EscalationPolicy {
    pub fn new(settings: RoutingSettings) -> Self {
        Self { settings }
    }

    /// Choose the tier and the adapters to query for it.
    pub fn decide(
        &self,
        classification: &ClassificationResult,
        text: &str,
        session: &Session,
        registry: &AdapterRegistry,
    ) -> TierDecision {
        let (tier, reasons) = self.choose_tier(classification, text, session);
        let adapters = self.select_adapters(tier, classification.intent, registry);

        debug!(
            tier = %tier,
            intent = %classification.intent,
            reasons = reasons.len(),
            adapters = adapters.len(),
            "Tier decision"
        );

        TierDecision {
            tier,
            reasons,
            adapters,
        }
    }

    /// Apply the escalation rules.
    ///
    /// Every Slow rule that fires is reported, not just the first.
    pub fn choose_tier(
        &self,
        classification: &ClassificationResult,
        text: &str,
        session: &Session,
    ) -> (Tier, Vec<EscalationReason>) {
        let words = text.split_whitespace().count();

        if self.is_continuation(classification, words, session) {
            return (Tier::Hot, vec![EscalationReason::Continuation]);
        }

        let mut reasons = Vec::new();

        if classification.confidence < self.settings.min_confidence {
            reasons.push(EscalationReason::LowConfidence {
                confidence: classification.confidence,
            });
        }
        if classification.competing {
            if let Some(second) = classification.runner_up() {
                reasons.push(EscalationReason::Competing {
                    first: classification.intent,
                    second: second.intent,
                });
            }
        }
        if classification.entities.len() > self.settings.max_entities {
            reasons.push(EscalationReason::ManyEntities {
                count: classification.entities.len(),
            });
        }
        if let Some(phrase) = HISTORY_REGEX.find(text) {
            reasons.push(EscalationReason::HistoryReference {
                phrase: phrase.as_str().to_lowercase(),
            });
        }
        if classification.intent == Intent::Planning {
            reasons.push(EscalationReason::Planning);
        }
        if words > self.settings.slow_word_threshold {
            reasons.push(EscalationReason::LongRequest { words });
        }
        let asks = count_asks(text);
        if asks >= 2 {
            reasons.push(EscalationReason::MultipleAsks { count: asks });
        }

        if reasons.is_empty() {
            (Tier::Fast, reasons)
        } else {
            (Tier::Slow, reasons)
        }
    }

    fn is_continuation(
        &self,
        classification: &ClassificationResult,
        words: usize,
        session: &Session,
    ) -> bool {
        session.last_turn().is_some()
            && words <= self.settings.continuation_max_words
            && classification.score_of(Intent::Continuation) > 0.0
    }

    /// Adapters queried on `tier`.
    ///
    /// Hot queries none, Fast the first `max_fast_adapters` eligible for the
    /// intent, Slow every registered adapter.
    pub fn select_adapters(
        &self,
        tier: Tier,
        intent: Intent,
        registry: &AdapterRegistry,
    ) -> Vec<RegisteredAdapter> {
        match tier {
            Tier::Hot => Vec::new(),
            Tier::Fast => registry
                .eligible_for(intent)
                .into_iter()
                .take(self.settings.max_fast_adapters)
                .collect(),
            Tier::Slow => registry.all().to_vec(),
        }
    }
}

/// Number of independent asks: question marks or enumerated list items,
/// whichever is larger.
fn count_asks(text: &str) -> usize {
    let questions = text.matches('?').count();
    let enumerated = ENUMERATED_REGEX.find_iter(text).count();
    questions.max(enumerated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::IntentClassifier;
    use context_adapters::StaticAdapter;
    use context_types::{SessionSettings, Turn};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn policy() -> EscalationPolicy {
        EscalationPolicy::new(RoutingSettings::default())
    }

    fn fresh_session(temp: &TempDir) -> Session {
        let storage = Arc::new(context_storage::Storage::open(temp.path()).unwrap());
        let store = context_session::SessionHistoryStore::new(storage, SessionSettings::default());
        store.open_session("s-1").unwrap()
    }

    fn session_with_turn(temp: &TempDir) -> Session {
        let storage = Arc::new(context_storage::Storage::open(temp.path()).unwrap());
        let store = context_session::SessionHistoryStore::new(storage, SessionSettings::default());
        let mut session = store.open_session("s-1").unwrap();
        store
            .add_turn(
                &mut session,
                Turn::new("Add a retry to the upload client", Intent::Implementation),
            )
            .unwrap();
        session
    }

    fn registry() -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        for (name, intents) in [
            ("search", vec![Intent::Debugging, Intent::Implementation]),
            ("memory", vec![Intent::Debugging, Intent::Implementation, Intent::Research]),
            ("tasks", vec![Intent::Implementation]),
            ("docs", vec![Intent::Implementation, Intent::Research]),
            ("notes", vec![Intent::Planning]),
        ] {
            registry
                .register(Arc::new(StaticAdapter::new(name, &intents)))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_debugging_request_takes_fast_tier() {
        let temp = TempDir::new().unwrap();
        let text = "Why is the authentication failing? I'm getting a 401 error on login.";
        let classification = IntentClassifier::new().classify(text);

        let decision = policy().decide(&classification, text, &fresh_session(&temp), &registry());
        assert_eq!(decision.tier, Tier::Fast);
        assert!(decision.reasons.is_empty());
        assert_eq!(decision.adapter_names(), vec!["search", "memory"]);
    }

    #[test]
    fn test_short_continuation_is_hot() {
        let temp = TempDir::new().unwrap();
        let classification = IntentClassifier::new().classify("yes, that one");

        let (tier, reasons) =
            policy().choose_tier(&classification, "yes, that one", &session_with_turn(&temp));
        assert_eq!(tier, Tier::Hot);
        assert_eq!(reasons, vec![EscalationReason::Continuation]);
    }

    #[test]
    fn test_continuation_needs_previous_turn() {
        let temp = TempDir::new().unwrap();
        let classification = IntentClassifier::new().classify("yes, that one");

        let (tier, _) =
            policy().choose_tier(&classification, "yes, that one", &fresh_session(&temp));
        assert_ne!(tier, Tier::Hot);
    }

    #[test]
    fn test_competing_always_slow() {
        let temp = TempDir::new().unwrap();
        let text = "Check the docs for this error";
        let classification = IntentClassifier::new().classify(text);
        assert!(classification.competing);

        let (tier, reasons) = policy().choose_tier(&classification, text, &fresh_session(&temp));
        assert_eq!(tier, Tier::Slow);
        assert!(reasons
            .iter()
            .any(|r| matches!(r, EscalationReason::Competing { .. })));
    }

    #[test]
    fn test_unknown_is_slow() {
        let temp = TempDir::new().unwrap();
        let classification = IntentClassifier::new().classify("memory stuff");

        let (tier, reasons) =
            policy().choose_tier(&classification, "memory stuff", &fresh_session(&temp));
        assert_eq!(tier, Tier::Slow);
        assert_eq!(reasons, vec![EscalationReason::LowConfidence { confidence: 0.0 }]);
    }

    #[test]
    fn test_planning_is_slow_and_queries_everything() {
        let temp = TempDir::new().unwrap();
        let text = "Let's design the architecture for the sync subsystem";
        let classification = IntentClassifier::new().classify(text);

        let decision = policy().decide(&classification, text, &fresh_session(&temp), &registry());
        assert_eq!(decision.tier, Tier::Slow);
        assert!(decision.reasons.contains(&EscalationReason::Planning));
        assert_eq!(decision.adapters.len(), 5);
    }

    #[test]
    fn test_history_reference_is_slow() {
        let temp = TempDir::new().unwrap();
        let text = "Fix the bug we discussed earlier in the upload path";
        let classification = IntentClassifier::new().classify(text);

        let (tier, reasons) = policy().choose_tier(&classification, text, &fresh_session(&temp));
        assert_eq!(tier, Tier::Slow);
        assert!(reasons
            .iter()
            .any(|r| matches!(r, EscalationReason::HistoryReference { .. })));
    }

    #[test]
    fn test_multiple_asks_is_slow() {
        let temp = TempDir::new().unwrap();
        let text = "Fix the crash in the parser.\n1. add a regression test\n2. update the changelog";
        let classification = IntentClassifier::new().classify(text);

        let (tier, reasons) = policy().choose_tier(&classification, text, &fresh_session(&temp));
        assert_eq!(tier, Tier::Slow);
        assert!(reasons.contains(&EscalationReason::MultipleAsks { count: 2 }));
    }

    #[test]
    fn test_fast_subset_is_capped() {
        let settings = RoutingSettings {
            max_fast_adapters: 2,
            ..Default::default()
        };
        let adapters = EscalationPolicy::new(settings).select_adapters(
            Tier::Fast,
            Intent::Implementation,
            &registry(),
        );
        let names: Vec<_> = adapters.iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["search", "memory"]);
    }

    #[test]
    fn test_hot_queries_no_adapters() {
        assert!(policy()
            .select_adapters(Tier::Hot, Intent::Debugging, &registry())
            .is_empty());
    }
}
