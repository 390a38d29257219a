//! Request intents and processing tiers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a request needs, as judged by the intent classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Something is broken: errors, failures, unexpected behavior.
    /// Examples: "Why is login returning 401?", "the build panics on startup"
    Debugging,

    /// Designing or sequencing work before writing it.
    /// Examples: "How should we structure the sync subsystem?"
    Planning,

    /// Writing or changing code.
    /// Examples: "Add a retry to the upload client"
    Implementation,

    /// Learning about an API, library or concept.
    /// Examples: "What does tokio::select! do?"
    Research,

    /// Follow-up to the previous turn.
    /// Examples: "yes", "continue", "do that one"
    Continuation,

    /// No pattern matched. Confidence is always 0.
    #[default]
    Unknown,
}

impl Intent {
    /// Every intent that can be produced by a pattern match.
    pub const CLASSIFIABLE: [Intent; 5] = [
        Intent::Debugging,
        Intent::Planning,
        Intent::Implementation,
        Intent::Research,
        Intent::Continuation,
    ];

    /// Returns the display name for this intent.
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Debugging => "debugging",
            Intent::Planning => "planning",
            Intent::Implementation => "implementation",
            Intent::Research => "research",
            Intent::Continuation => "continuation",
            Intent::Unknown => "unknown",
        }
    }

    /// Whether a turn with this intent names the task the session is working on.
    pub fn sets_current_task(&self) -> bool {
        matches!(
            self,
            Intent::Debugging | Intent::Planning | Intent::Implementation
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing tier chosen by the escalation policy.
///
/// Tiers are ordered by latency budget and information breadth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Session state only, no adapters.
    Hot,
    /// Bounded parallel fan-out over an intent-specific adapter subset.
    Fast,
    /// Every adapter plus full session history and prior sessions.
    Slow,
}

impl Tier {
    /// Returns the display name for this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hot => "hot",
            Tier::Fast => "fast",
            Tier::Slow => "slow",
        }
    }

    /// End-to-end latency target.
    pub fn latency_target(&self) -> Duration {
        match self {
            Tier::Hot => Duration::from_millis(100),
            Tier::Fast => Duration::from_millis(500),
            Tier::Slow => Duration::from_secs(5),
        }
    }

    /// Whether this tier calls adapters at all.
    pub fn uses_adapters(&self) -> bool {
        !matches!(self, Tier::Hot)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
