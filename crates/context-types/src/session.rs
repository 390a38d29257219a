//! Turn, session summary and session snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::Intent;

/// One request/response exchange within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// The user's request text
    pub user_text: String,

    /// The assistant's reply, if the host recorded it
    #[serde(default)]
    pub assistant_text: Option<String>,

    /// When the turn was created
    pub timestamp: DateTime<Utc>,

    /// Adapters or tools invoked for this turn, in order
    #[serde(default)]
    pub tools_used: Vec<String>,

    /// Intent assigned by the classifier
    pub intent_type: Intent,
}

impl Turn {
    /// Create a turn stamped with the current time.
    pub fn new(user_text: impl Into<String>, intent_type: Intent) -> Self {
        Self {
            user_text: user_text.into(),
            assistant_text: None,
            timestamp: Utc::now(),
            tools_used: Vec::new(),
            intent_type,
        }
    }

    /// Set the assistant reply.
    pub fn with_assistant_text(mut self, text: impl Into<String>) -> Self {
        self.assistant_text = Some(text.into());
        self
    }

    /// Set the tools used.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools_used = tools;
        self
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Rolling aggregate over every turn of the current session.
///
/// All lists are bounded; once full, the oldest entry is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Deduplicated topics, least recently mentioned first
    pub topics: Vec<String>,

    /// Extracted decisions, oldest first
    pub decisions: Vec<String>,

    /// Referenced file paths, least recently mentioned first
    pub file_scope: Vec<String>,

    /// What the session is currently working on
    pub current_task: Option<String>,

    /// Number of turns added so far
    pub turn_count: u32,

    /// When the session started
    pub started_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Create an empty summary starting now.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create an empty summary with an explicit start time.
    pub fn starting_at(started_at: DateTime<Utc>) -> Self {
        Self {
            topics: Vec::new(),
            decisions: Vec::new(),
            file_scope: Vec::new(),
            current_task: None,
            turn_count: 0,
            started_at,
        }
    }

    /// Whether nothing worth carrying into another session was extracted.
    pub fn has_extractions(&self) -> bool {
        !self.topics.is_empty() || !self.decisions.is_empty()
    }
}

impl Default for SessionSummary {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable summary of a finished session.
///
/// Written once at session close and read by later sessions at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session this snapshot was taken from
    pub session_id: String,

    /// Most recent topics, newest first
    pub topics: Vec<String>,

    /// Most recent decisions, newest first
    pub decisions: Vec<String>,

    /// Referenced files, newest first
    pub files: Vec<String>,

    /// Session start
    pub started_at: DateTime<Utc>,

    /// Session end; also the persisted sort key
    pub ended_at: DateTime<Utc>,

    /// Number of turns in the session
    pub turn_count: u32,
}

impl SessionSnapshot {
    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
