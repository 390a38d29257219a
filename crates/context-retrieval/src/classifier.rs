//! Intent classification for requests.
//!
//! This module implements the `IntentClassifier` which scores request text
//! against keyword lists for each intent (debugging, planning,
//! implementation, research, continuation) and extracts the entities the
//! request mentions.
//!
//! Classification is keyword and regex only; it never calls out to a model
//! or the network.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use context_session::file_references;
use context_types::Intent;

/// Score of one candidate intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub intent: Intent,

    /// Score (0.0-1.0)
    pub score: f32,

    /// Keywords and cues that contributed
    pub matched: Vec<String>,
}

/// Result of intent classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// The winning intent
    pub intent: Intent,

    /// Confidence score (0.0-1.0); 0.0 for `Unknown`
    pub confidence: f32,

    /// Whether the runner-up scored within epsilon of the winner
    pub competing: bool,

    /// Every intent that scored above zero, best first
    pub scores: Vec<IntentScore>,

    /// File names, identifiers and library names found in the text
    pub entities: Vec<String>,

    /// Explanation of why this intent was chosen
    pub reason: String,
}

impl ClassificationResult {
    /// Score of `intent`, 0.0 if it did not match at all.
    pub fn score_of(&self, intent: Intent) -> f32 {
        self.scores
            .iter()
            .find(|s| s.intent == intent)
            .map(|s| s.score)
            .unwrap_or(0.0)
    }

    /// Second-best intent, if any scored.
    pub fn runner_up(&self) -> Option<&IntentScore> {
        self.scores.get(1)
    }

    /// Keywords behind the winning intent.
    pub fn matched_keywords(&self) -> &[String] {
        self.scores
            .first()
            .map(|s| s.matched.as_slice())
            .unwrap_or(&[])
    }
}

/// Configuration for intent classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Keywords that indicate Debugging intent
    pub debugging_keywords: Vec<String>,

    /// Keywords that indicate Planning intent
    pub planning_keywords: Vec<String>,

    /// Keywords that indicate Implementation intent
    pub implementation_keywords: Vec<String>,

    /// Keywords that indicate Research intent
    pub research_keywords: Vec<String>,

    /// Reference words that mark a continuation of the previous turn
    pub continuation_keywords: Vec<String>,

    /// Library and framework names reported as entities
    pub known_libraries: Vec<String>,

    /// Score gap under which the top two intents are competing
    pub competing_epsilon: f32,
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            debugging_keywords: strings(&[
                "bug",
                "bugs",
                "error",
                "errors",
                "failing",
                "fails",
                "failed",
                "failure",
                "crash",
                "crashes",
                "broken",
                "exception",
                "panic",
                "panics",
                "stack trace",
                "traceback",
                "not working",
                "doesn't work",
                "debug",
                "fix",
                "wrong",
                "unexpected",
                "regression",
            ]),
            planning_keywords: strings(&[
                "plan",
                "planning",
                "design",
                "architecture",
                "roadmap",
                "strategy",
                "approach",
                "proposal",
                "trade-off",
                "trade-offs",
                "tradeoffs",
                "should we",
                "milestone",
                "milestones",
                "subsystem",
                "phases",
            ]),
            implementation_keywords: strings(&[
                "implement",
                "add",
                "create",
                "build",
                "write",
                "refactor",
                "update",
                "change",
                "integrate",
                "wire up",
                "support for",
                "feature",
            ]),
            research_keywords: strings(&[
                "what is",
                "what are",
                "how does",
                "how do",
                "explain",
                "documentation",
                "docs",
                "compare",
                "difference between",
                "learn",
                "understand",
                "best practice",
                "best practices",
                "example of",
                "alternatives",
            ]),
            continuation_keywords: strings(&[
                "yes",
                "yep",
                "yeah",
                "ok",
                "okay",
                "sure",
                "continue",
                "go ahead",
                "do it",
                "do that",
                "that one",
                "sounds good",
                "proceed",
                "keep going",
                "next",
                "same",
            ]),
            known_libraries: strings(&[
                "tokio",
                "serde",
                "axum",
                "actix",
                "hyper",
                "reqwest",
                "tonic",
                "diesel",
                "sqlx",
                "rocksdb",
                "react",
                "vue",
                "angular",
                "django",
                "flask",
                "fastapi",
                "express",
                "postgres",
                "redis",
                "kafka",
                "docker",
                "kubernetes",
                "pytorch",
                "numpy",
                "pandas",
            ]),
            competing_epsilon: 0.05,
        }
    }
}

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(_compile_err) => match Regex::new(r"$^") {
            Ok(never) => never,
            Err(fallback_err) => panic!("hardcoded fallback regex must compile: {fallback_err}"),
        },
    }
}

/// HTTP status codes and similar numeric failure codes.
static STATUS_CODE_REGEX: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"\b[45]\d\d\b"));
/// Leading question word of a lookup-style question.
static QUESTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"(?i)^\s*(?:what|how|which|where)\b[^?]*\?"));
static BACKTICK_REGEX: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"`([^`\n]{1,80})`"));
static CAMEL_CASE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\b[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]*)+\b"));
static SNAKE_CASE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\b[a-z][a-z0-9]*(?:_[a-z0-9]+)+\b"));
static PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"\b[A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z_][A-Za-z0-9_]*)+")
});

/// One keyword compiled to a whole-word, case-insensitive matcher.
struct Keyword {
    word: String,
    regex: Regex,
}

fn compile_keywords(words: &[String]) -> Vec<Keyword> {
    words
        .iter()
        .filter_map(|word| {
            let word = word.trim().to_lowercase();
            if word.is_empty() {
                return None;
            }
            match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&word))) {
                Ok(regex) => Some(Keyword { word, regex }),
                Err(e) => {
                    warn!(keyword = %word, error = %e, "Skipping keyword that does not compile");
                    None
                }
            }
        })
        .collect()
}

/// Intent classifier using keyword heuristics.
pub struct IntentClassifier {
    config: ClassifierConfig,
    keywords: Vec<(Intent, Vec<Keyword>)>,
    libraries: Vec<Keyword>,
}

impl IntentClassifier {
    /// Create a new classifier with default configuration.
    pub fn new() -> Self {
        Self::with_config(ClassifierConfig::default())
    }

    /// Create a classifier with custom configuration.
    pub fn with_config(config: ClassifierConfig) -> Self {
        let keywords = vec![
            (Intent::Debugging, compile_keywords(&config.debugging_keywords)),
            (Intent::Planning, compile_keywords(&config.planning_keywords)),
            (
                Intent::Implementation,
                compile_keywords(&config.implementation_keywords),
            ),
            (Intent::Research, compile_keywords(&config.research_keywords)),
            (
                Intent::Continuation,
                compile_keywords(&config.continuation_keywords),
            ),
        ];
        let libraries = compile_keywords(&config.known_libraries);

        Self {
            config,
            keywords,
            libraries,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify the intent of a request.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let entities = self.extract_entities(text);

        let mut scores: Vec<IntentScore> = self
            .keywords
            .iter()
            .filter_map(|(intent, keywords)| {
                let mut matched: Vec<String> = keywords
                    .iter()
                    .filter(|k| k.regex.is_match(text))
                    .map(|k| k.word.clone())
                    .collect();
                matched.extend(self.structural_cues(*intent, text));

                let score = calculate_score(&matched);
                (score > 0.0).then_some(IntentScore {
                    intent: *intent,
                    score,
                    matched,
                })
            })
            .collect();

        // Stable: equal scores keep the declaration order above
        scores.sort_by(|a, b| b.score.total_cmp(&a.score));

        let result = match scores.first() {
            None => ClassificationResult {
                intent: Intent::Unknown,
                confidence: 0.0,
                competing: false,
                scores: Vec::new(),
                entities,
                reason: "No intent keywords matched".to_string(),
            },
            Some(best) => {
                let competing = scores
                    .get(1)
                    .map(|second| best.score - second.score <= self.config.competing_epsilon)
                    .unwrap_or(false);

                let reason = if competing {
                    format!(
                        "{} and {} are competing ({:.2} vs {:.2})",
                        best.intent,
                        scores[1].intent,
                        best.score,
                        scores[1].score
                    )
                } else {
                    format!(
                        "{} intent: matched [{}]",
                        best.intent,
                        best.matched.join(", ")
                    )
                };

                ClassificationResult {
                    intent: best.intent,
                    confidence: best.score,
                    competing,
                    entities,
                    reason,
                    scores,
                }
            }
        };

        debug!(
            intent = %result.intent,
            confidence = result.confidence,
            competing = result.competing,
            entities = result.entities.len(),
            "Intent classification"
        );

        result
    }

    /// Cues that are not plain keywords.
    fn structural_cues(&self, intent: Intent, text: &str) -> Vec<String> {
        let mut cues = Vec::new();
        match intent {
            Intent::Debugging if STATUS_CODE_REGEX.is_match(text) => {
                cues.push("status code".to_string());
            }
            Intent::Research if QUESTION_REGEX.is_match(text) => {
                cues.push("question form".to_string());
            }
            _ => {}
        }
        cues
    }

    /// File names, code identifiers and known library names in `text`.
    pub fn extract_entities(&self, text: &str) -> Vec<String> {
        let mut entities: Vec<String> = Vec::new();

        let files = file_references(text);
        for file in &files {
            push_unique(&mut entities, file);
        }

        for caps in BACKTICK_REGEX.captures_iter(text) {
            if let Some(code) = caps.get(1) {
                push_unique(&mut entities, code.as_str());
            }
        }

        let identifiers = PATH_REGEX
            .find_iter(text)
            .chain(CAMEL_CASE_REGEX.find_iter(text))
            .chain(SNAKE_CASE_REGEX.find_iter(text));
        for ident in identifiers {
            let ident = ident.as_str();
            // Already covered by a file path or a `a::b` path
            let nested = files.iter().any(|f| f.contains(ident))
                || entities.iter().any(|e| e.contains("::") && e.contains(ident));
            if !nested {
                push_unique(&mut entities, ident);
            }
        }

        for library in &self.libraries {
            if library.regex.is_match(text) {
                push_unique(&mut entities, &library.word);
            }
        }

        entities
    }
}

fn push_unique(entities: &mut Vec<String>, entity: &str) {
    let entity = entity.trim();
    if !entity.is_empty() && !entities.iter().any(|e| e == entity) {
        entities.push(entity.to_string());
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyword score: up to three matches count fully, and each match longer
/// than five characters adds 0.1 for specificity. Capped at 1.0.
fn calculate_score(matches: &[String]) -> f32 {
    if matches.is_empty() {
        return 0.0;
    }

    let base = (matches.len() as f32).min(3.0) / 3.0;
    let specificity_bonus: f32 = matches
        .iter()
        .map(|k| if k.len() > 5 { 0.1 } else { 0.0 })
        .sum();

    (base + specificity_bonus).min(1.0)
}
