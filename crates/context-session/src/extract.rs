//! Deterministic extraction rules for session summaries.
//!
//! These are heuristics, not NLP:
//! - Files: path-like tokens ending in a known source or config extension.
//! - Topics: the language/area implied by file extensions, plus a fixed table
//!   of concept keywords.
//! - Decisions: a trigger phrase ("decided to", "let's go with", ...) followed
//!   by 10 to 100 characters up to the end of the sentence. Longer clauses
//!   are clipped at 100 characters; shorter ones are not recorded.
//! - Current task: the first sentence of a debugging, planning or
//!   implementation request.

use std::sync::LazyLock;

use context_types::{SessionSettings, SessionSummary, Turn};
use regex::Regex;

const FILE_PATTERN: &str = r"(?:[A-Za-z0-9_.-]+/)*[A-Za-z0-9_-]+\.(rs|py|tsx?|jsx?|go|java|kt|rb|cpp|hpp|cc|c|h|cs|swift|toml|ya?ml|json|md|sql|sh|proto|html|css)\b";

const DECISION_PATTERN: &str = r"(?i)\b(?:we(?:'ve| have)? decided to|decided to|decision:|let's go with|let's use|we'll use|we will use|we'll go with|going with|we chose|chose to|the plan is to|agreed to)\s+([^.!?\n]{10,100})";

const CONCEPTS: &[(&str, &str)] = &[
    (
        "authentication",
        r"auth|authentication|authorization|login|logout|jwt|oauth|password|credentials?",
    ),
    (
        "database",
        r"database|db|sql|postgres(?:ql)?|sqlite|mysql|migrations?|schema|rocksdb",
    ),
    ("caching", r"cache|caching|cached|ttl|eviction"),
    ("testing", r"tests?|testing|unit tests?|integration tests?|fixtures?"),
    (
        "deployment",
        r"deploy|deployment|docker|kubernetes|k8s|ci|pipeline|release",
    ),
    ("api", r"api|endpoints?|rest|grpc|http|routes?|handlers?"),
    (
        "performance",
        r"performance|latency|slow|throughput|optimi[sz]e|profil(?:e|ing)",
    ),
    ("security", r"security|vulnerabilit(?:y|ies)|permissions?|secrets?|csrf|xss"),
    ("logging", r"logging|logs?|tracing|telemetry|metrics"),
    ("configuration", r"config|configuration|settings|env vars?"),
    (
        "concurrency",
        r"async|threads?|concurrency|race conditions?|deadlocks?|mutex|locks?",
    ),
    ("error handling", r"error handling|panics?|exceptions?|retry|retries"),
    ("frontend", r"frontend|ui|css|react|components?|layout"),
    ("refactoring", r"refactor|refactoring|cleanup|restructure"),
];

fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(_compile_err) => match Regex::new(r"$^") {
            Ok(never) => never,
            Err(fallback_err) => panic!("hardcoded fallback regex must compile: {fallback_err}"),
        },
    }
}

static FILE_REGEX: LazyLock<Regex> = LazyLock::new(|| compile_regex(FILE_PATTERN));
static DECISION_REGEX: LazyLock<Regex> = LazyLock::new(|| compile_regex(DECISION_PATTERN));
static CONCEPT_REGEXES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    CONCEPTS
        .iter()
        .map(|(topic, pattern)| (*topic, compile_regex(&format!(r"(?i)\b(?:{pattern})\b"))))
        .collect()
});

/// File paths mentioned in `text`, in order of first mention.
pub fn file_references(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in FILE_REGEX.find_iter(text) {
        let path = m.as_str().trim_start_matches("./").to_string();
        if !found.contains(&path) {
            found.push(path);
        }
    }
    found
}

fn extension_topic(extension: &str) -> Option<&'static str> {
    match extension {
        "rs" => Some("rust"),
        "py" => Some("python"),
        "ts" | "tsx" => Some("typescript"),
        "js" | "jsx" => Some("javascript"),
        "go" => Some("go"),
        "java" | "kt" => Some("jvm"),
        "rb" => Some("ruby"),
        "c" | "h" | "cpp" | "hpp" | "cc" => Some("c/c++"),
        "cs" => Some("dotnet"),
        "swift" => Some("swift"),
        "toml" | "yaml" | "yml" | "json" => Some("configuration"),
        "md" => Some("documentation"),
        "sql" => Some("database"),
        "sh" => Some("shell"),
        "proto" => Some("api"),
        "html" | "css" => Some("frontend"),
        _ => None,
    }
}

/// Folds turns into a [`SessionSummary`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Extractor;

impl Extractor {
    pub fn new() -> Self {
        Self
    }

    pub fn files(&self, text: &str) -> Vec<String> {
        file_references(text)
    }

    /// Topics mentioned in `text`: extension-derived first, then concepts.
    pub fn topics(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let mut add = |topic: &str| {
            if !found.iter().any(|t| t == topic) {
                found.push(topic.to_string());
            }
        };

        for caps in FILE_REGEX.captures_iter(text) {
            if let Some(topic) = caps.get(1).and_then(|ext| extension_topic(ext.as_str())) {
                add(topic);
            }
        }
        for (topic, regex) in CONCEPT_REGEXES.iter() {
            if regex.is_match(text) {
                add(topic);
            }
        }
        found
    }

    /// Decisions stated in `text`.
    pub fn decisions(&self, text: &str) -> Vec<String> {
        DECISION_REGEX
            .find_iter(text)
            .map(|m| m.as_str().trim().to_string())
            .collect()
    }

    /// Task description for a turn, if its intent names one.
    pub fn current_task(&self, turn: &Turn) -> Option<String> {
        if !turn.intent_type.sets_current_task() {
            return None;
        }
        let first_sentence = turn
            .user_text
            .split(['.', '?', '!', '\n'])
            .map(str::trim)
            .find(|s| !s.is_empty())?;
        Some(first_sentence.chars().take(120).collect())
    }

    /// Fold one turn into a summary, honouring the configured bounds.
    pub fn apply(&self, summary: &mut SessionSummary, turn: &Turn, settings: &SessionSettings) {
        summary.turn_count += 1;

        let mut texts = vec![turn.user_text.as_str()];
        if let Some(reply) = &turn.assistant_text {
            texts.push(reply.as_str());
        }

        for text in texts {
            for topic in self.topics(text) {
                touch_bounded(&mut summary.topics, topic, settings.max_topics);
            }
            for file in self.files(text) {
                touch_bounded(&mut summary.file_scope, file, settings.max_files);
            }
            for decision in self.decisions(text) {
                if !summary.decisions.contains(&decision) {
                    push_bounded(&mut summary.decisions, decision, settings.max_decisions);
                }
            }
        }

        if let Some(task) = self.current_task(turn) {
            summary.current_task = Some(task);
        }
    }
}

/// Move `value` to the back (most recent), dropping the front once over `max`.
fn touch_bounded(list: &mut Vec<String>, value: String, max: usize) {
    list.retain(|v| *v != value);
    push_bounded(list, value, max);
}

fn push_bounded(list: &mut Vec<String>, value: String, max: usize) {
    list.push(value);
    while list.len() > max {
        list.remove(0);
    }
}
