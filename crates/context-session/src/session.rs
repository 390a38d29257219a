//! In-memory state of one conversation.

use std::collections::VecDeque;

use context_types::{ContextItem, ItemKind, SessionSnapshot, SessionSummary, Turn};

/// Source name attached to items built from the current session.
pub const SESSION_SOURCE: &str = "session";

/// Source name attached to items built from prior-session snapshots.
pub const HISTORY_SOURCE: &str = "history";

/// One logical conversation.
///
/// Mutated only through [`SessionHistoryStore::add_turn`](crate::SessionHistoryStore::add_turn),
/// which persists before it commits here.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    pub(crate) window: VecDeque<Turn>,
    pub(crate) summary: SessionSummary,
    pub(crate) prior: Vec<SessionSnapshot>,
}

impl Session {
    pub(crate) fn new(
        id: impl Into<String>,
        window: VecDeque<Turn>,
        summary: SessionSummary,
        prior: Vec<SessionSnapshot>,
    ) -> Self {
        Self {
            id: id.into(),
            window,
            summary,
            prior,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Turns in the rolling window, oldest first.
    pub fn recent_turns(&self) -> impl Iterator<Item = &Turn> {
        self.window.iter()
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// The immediately preceding turn, if any.
    pub fn last_turn(&self) -> Option<&Turn> {
        self.window.back()
    }

    /// Snapshots of earlier sessions loaded at start-up, newest first.
    pub fn prior_snapshots(&self) -> &[SessionSnapshot] {
        &self.prior
    }

    /// Sequence number the next turn will be stored under.
    pub(crate) fn next_sequence(&self) -> u32 {
        self.summary.turn_count
    }

    /// Session state rendered as context items.
    ///
    /// Always includes the summary (when it has content) and the recent turns,
    /// newest first. Prior-session snapshots are added when `include_prior` is
    /// set.
    pub fn context_items(&self, include_prior: bool) -> Vec<ContextItem> {
        let mut items = Vec::new();

        if let Some(body) = self.summary_body() {
            items.push(
                ContextItem::new(SESSION_SOURCE, ItemKind::SessionState, "Session summary", body)
                    .with_locator(format!("session:{}:summary", self.id))
                    .with_score(1.0),
            );
        }

        let first_sequence = self.summary.turn_count.saturating_sub(self.window.len() as u32);
        let newest = self.window.len().saturating_sub(1);
        for (offset, turn) in self.window.iter().enumerate().rev() {
            let sequence = first_sequence + offset as u32;
            let age = (newest - offset) as u32;
            let mut body = format!("User: {}", turn.user_text);
            if let Some(reply) = &turn.assistant_text {
                body.push_str("\nAssistant: ");
                body.push_str(reply);
            }
            items.push(
                ContextItem::new(
                    SESSION_SOURCE,
                    ItemKind::SessionState,
                    format!("Turn {} ({})", sequence + 1, turn.intent_type),
                    body,
                )
                .with_locator(format!("session:{}:turn:{}", self.id, sequence))
                .with_freshness(age)
                .with_score(0.9 - 0.1 * age as f32),
            );
        }

        if include_prior {
            for (rank, snapshot) in self.prior.iter().enumerate() {
                items.push(
                    ContextItem::new(
                        HISTORY_SOURCE,
                        ItemKind::PriorSession,
                        format!(
                            "Session {} ({})",
                            snapshot.session_id,
                            snapshot.ended_at.format("%Y-%m-%d %H:%M")
                        ),
                        snapshot_body(snapshot),
                    )
                    .with_locator(format!("snapshot:{}", snapshot.session_id))
                    .with_freshness(rank as u32 + 1)
                    .with_score(0.6 - 0.1 * rank as f32),
                );
            }
        }

        items
    }

    fn summary_body(&self) -> Option<String> {
        let summary = &self.summary;
        let mut lines = Vec::new();
        if let Some(task) = &summary.current_task {
            lines.push(format!("Current task: {}", task));
        }
        if !summary.topics.is_empty() {
            lines.push(format!("Topics: {}", summary.topics.join(", ")));
        }
        if !summary.decisions.is_empty() {
            lines.push(format!("Decisions: {}", summary.decisions.join("; ")));
        }
        if !summary.file_scope.is_empty() {
            lines.push(format!("Files: {}", summary.file_scope.join(", ")));
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

fn snapshot_body(snapshot: &SessionSnapshot) -> String {
    let mut lines = vec![format!("{} turns", snapshot.turn_count)];
    if !snapshot.topics.is_empty() {
        lines.push(format!("Topics: {}", snapshot.topics.join(", ")));
    }
    if !snapshot.decisions.is_empty() {
        lines.push(format!("Decisions: {}", snapshot.decisions.join("; ")));
    }
    if !snapshot.files.is_empty() {
        lines.push(format!("Files: {}", snapshot.files.join(", ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use context_types::Intent;

    fn session_with_turns(count: u32) -> Session {
        let mut summary = SessionSummary::new();
        let mut window = VecDeque::new();
        for i in 0..count {
            window.push_back(Turn::new(format!("request {}", i), Intent::Implementation));
            summary.turn_count += 1;
        }
        summary.topics.push("rust".to_string());
        Session::new("s-1", window, summary, Vec::new())
    }

    #[test]
    fn test_empty_session_has_no_items() {
        let session = Session::new("s-1", VecDeque::new(), SessionSummary::new(), Vec::new());
        assert!(session.context_items(true).is_empty());
        assert!(session.last_turn().is_none());
    }

    #[test]
    fn test_turn_items_newest_first_with_stable_locators() {
        let session = session_with_turns(3);
        let items = session.context_items(false);

        assert_eq!(items.len(), 4);
        assert_eq!(items[0].locator, "session:s-1:summary");
        assert_eq!(items[1].locator, "session:s-1:turn:2");
        assert_eq!(items[3].locator, "session:s-1:turn:0");
        assert!(items[1].score > items[3].score);
        assert_eq!(session.last_turn().map(|t| t.user_text.as_str()), Some("request 2"));
    }

    #[test]
    fn test_prior_snapshots_only_when_requested() {
        let mut session = session_with_turns(1);
        session.prior.push(SessionSnapshot {
            session_id: "old".to_string(),
            topics: vec!["database".to_string()],
            decisions: vec!["We decided to use sqlite for tests".to_string()],
            files: vec![],
            started_at: Utc::now(),
            ended_at: Utc::now(),
            turn_count: 4,
        });

        assert!(session
            .context_items(false)
            .iter()
            .all(|i| i.kind != ItemKind::PriorSession));

        let items = session.context_items(true);
        let prior: Vec<_> = items
            .iter()
            .filter(|i| i.kind == ItemKind::PriorSession)
            .collect();
        assert_eq!(prior.len(), 1);
        assert_eq!(prior[0].source, HISTORY_SOURCE);
        assert_eq!(prior[0].locator, "snapshot:old");
        assert!(prior[0].body.contains("sqlite"));
    }
}
