//! Context items produced by adapters and session state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on `ContextItem::body` length, in characters.
pub const MAX_BODY_CHARS: usize = 4000;

/// Kind of information carried by a context item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// A location in source code (file + line, symbol)
    CodeReference,
    /// A remembered fact or earlier conversation fragment
    Memory,
    /// An entry on a task board
    Task,
    /// Documentation fetched from outside the project
    ExternalDoc,
    /// A free-form note
    Note,
    /// State of the current session (recent turns, summary)
    SessionState,
    /// Summary carried over from a finished session
    PriorSession,
}

impl ItemKind {
    /// Returns the display name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::CodeReference => "code_reference",
            ItemKind::Memory => "memory",
            ItemKind::Task => "task",
            ItemKind::ExternalDoc => "external_doc",
            ItemKind::Note => "note",
            ItemKind::SessionState => "session_state",
            ItemKind::PriorSession => "prior_session",
        }
    }

    /// Heading used when rendering a briefing section for this kind.
    pub fn heading(&self) -> &'static str {
        match self {
            ItemKind::CodeReference => "Code References",
            ItemKind::Memory => "Memory",
            ItemKind::Task => "Tasks",
            ItemKind::ExternalDoc => "External Documentation",
            ItemKind::Note => "Notes",
            ItemKind::SessionState => "Current Session",
            ItemKind::PriorSession => "Previous Sessions",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic, attributable piece of retrieved information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    /// Name of the adapter (or session component) that produced this item
    pub source: String,

    /// What kind of information this is
    pub kind: ItemKind,

    /// Short human-readable title
    pub title: String,

    /// Item text, at most `MAX_BODY_CHARS` characters
    pub body: String,

    /// Opaque reference such as `file:line` or a URL. Empty when unknown.
    #[serde(default)]
    pub locator: String,

    /// Age in abstract units; 0 means always current
    #[serde(default)]
    pub freshness: u32,

    /// Adapter-assigned relevance (0.0-1.0)
    #[serde(default)]
    pub score: f32,
}

impl ContextItem {
    /// Create a new item. The body is truncated to `MAX_BODY_CHARS`.
    pub fn new(
        source: impl Into<String>,
        kind: ItemKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            kind,
            title: title.into(),
            body: bound_body(body.into()),
            locator: String::new(),
            freshness: 0,
            score: 0.0,
        }
    }

    /// Set the locator.
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = locator.into();
        self
    }

    /// Set the relevance score, clamped to 0.0-1.0.
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        self
    }

    /// Set the freshness.
    pub fn with_freshness(mut self, freshness: u32) -> Self {
        self.freshness = freshness;
        self
    }

    /// Whether the body carries any text.
    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

fn bound_body(body: String) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((byte_end, _)) => body[..byte_end].to_string(),
        None => body,
    }
}
