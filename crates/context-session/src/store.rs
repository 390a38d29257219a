//! Session history store.
//!
//! Owns every live [`Session`] and the persisted turn log, summaries and
//! snapshots behind them.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use context_storage::{SnapshotKey, Storage, TurnKey};
use context_types::{SessionSettings, SessionSnapshot, SessionSummary, Turn};

use crate::error::SessionError;
use crate::extract::Extractor;
use crate::session::Session;

/// Shared handle to a live session.
///
/// Hold the lock for the whole request so turns within one session are
/// processed one at a time.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Per-session turn log, rolling summary and cross-session snapshots.
pub struct SessionHistoryStore {
    storage: Arc<Storage>,
    settings: SessionSettings,
    extractor: Extractor,
    sessions: DashMap<String, SessionHandle>,
}

impl SessionHistoryStore {
    pub fn new(storage: Arc<Storage>, settings: SessionSettings) -> Self {
        Self {
            storage,
            settings,
            extractor: Extractor::new(),
            sessions: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Get the live session for `session_id`, opening it on first use.
    pub fn session(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.sessions.get(session_id) {
            return Ok(handle.clone());
        }

        // Loaded outside the map entry; a racing open of the same id keeps
        // whichever handle lands first.
        let session = self.open_session(session_id)?;
        let handle = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone();
        Ok(handle)
    }

    /// Number of sessions currently held in memory.
    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Rebuild a session from storage.
    ///
    /// A session with no stored state starts empty. Prior-session snapshots
    /// are loaded newest first, never including this session's own.
    pub fn open_session(&self, session_id: &str) -> Result<Session, SessionError> {
        let summary = match self.storage.get_summary(session_id)? {
            Some(bytes) => serde_json::from_slice::<SessionSummary>(&bytes)
                .map_err(|e| SessionError::corrupt(session_id, format!("summary: {}", e)))?,
            None => SessionSummary::new(),
        };

        let mut window = VecDeque::with_capacity(self.settings.window_size);
        if summary.turn_count > 0 {
            let turns = self.turn_log(session_id)?;
            let skip = turns.len().saturating_sub(self.settings.window_size);
            window.extend(turns.into_iter().skip(skip));
        }

        let prior: Vec<SessionSnapshot> = self
            .load_recent(self.settings.recent_sessions + 1)?
            .into_iter()
            .filter(|s| s.session_id != session_id)
            .take(self.settings.recent_sessions)
            .collect();

        debug!(
            session_id,
            turn_count = summary.turn_count,
            window = window.len(),
            prior = prior.len(),
            "Opened session"
        );
        Ok(Session::new(session_id, window, summary, prior))
    }

    /// Append a turn to the session.
    ///
    /// The turn and the updated summary are written in one batch before the
    /// in-memory session changes, so a failed write leaves it untouched.
    pub fn add_turn(&self, session: &mut Session, turn: Turn) -> Result<(), SessionError> {
        let mut summary = session.summary.clone();
        self.extractor.apply(&mut summary, &turn, &self.settings);

        let key = TurnKey::new(session.id(), session.next_sequence());
        let turn_bytes = serde_json::to_vec(&turn)?;
        let summary_bytes = serde_json::to_vec(&summary)?;
        self.storage.append_turn(&key, &turn_bytes, &summary_bytes)?;

        session.summary = summary;
        session.window.push_back(turn);
        while session.window.len() > self.settings.window_size {
            session.window.pop_front();
        }

        debug!(
            session_id = session.id(),
            sequence = key.sequence,
            topics = session.summary.topics.len(),
            decisions = session.summary.decisions.len(),
            "Added turn"
        );
        Ok(())
    }

    /// End a session and persist its snapshot.
    ///
    /// Returns the snapshot that was written, or `None` when the session had
    /// nothing worth carrying over or the write failed. Write failures are
    /// logged; closing never fails because of them.
    pub async fn snapshot_and_close(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionSnapshot>, SessionError> {
        let handle = match self.sessions.remove(session_id) {
            Some((_, handle)) => handle,
            None => Arc::new(Mutex::new(self.open_session(session_id)?)),
        };
        let session = handle.lock().await;
        let summary = session.summary();

        if summary.turn_count == 0 || !summary.has_extractions() {
            info!(
                session_id,
                turn_count = summary.turn_count,
                "Session closed without snapshot"
            );
            return Ok(None);
        }

        let snapshot = self.build_snapshot(&session);
        if let Err(e) = self.write_snapshot(&snapshot) {
            warn!(session_id, error = %e, "Failed to write session snapshot");
            return Ok(None);
        }

        info!(
            session_id,
            turn_count = snapshot.turn_count,
            topics = snapshot.topics.len(),
            decisions = snapshot.decisions.len(),
            "Session closed with snapshot"
        );
        Ok(Some(snapshot))
    }

    fn build_snapshot(&self, session: &Session) -> SessionSnapshot {
        let summary = session.summary();
        let newest = |list: &[String], k: usize| list.iter().rev().take(k).cloned().collect();
        SessionSnapshot {
            session_id: session.id().to_string(),
            topics: newest(&summary.topics, self.settings.snapshot_topics),
            decisions: newest(&summary.decisions, self.settings.snapshot_decisions),
            files: newest(&summary.file_scope, self.settings.snapshot_files),
            started_at: summary.started_at,
            ended_at: chrono::Utc::now(),
            turn_count: summary.turn_count,
        }
    }

    fn write_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), SessionError> {
        let key = SnapshotKey::new(snapshot.ended_at.timestamp_millis(), &snapshot.session_id)?;
        let bytes = snapshot.to_bytes()?;
        self.storage.put_snapshot(&key, &bytes)?;
        Ok(())
    }

    /// Up to `max_sessions` prior snapshots, newest first.
    ///
    /// Snapshots that fail to decode are skipped with a warning.
    pub fn load_recent(&self, max_sessions: usize) -> Result<Vec<SessionSnapshot>, SessionError> {
        if max_sessions == 0 {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::with_capacity(max_sessions);
        for (key, bytes) in self.storage.recent_snapshots(max_sessions)? {
            match SessionSnapshot::from_bytes(&bytes) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!(session_id = %key.session_id, error = %e, "Skipping corrupt snapshot")
                }
            }
        }
        Ok(snapshots)
    }

    /// Full persisted turn log of a session, oldest first.
    pub fn turn_log(&self, session_id: &str) -> Result<Vec<Turn>, SessionError> {
        self.storage
            .get_turns(session_id)?
            .into_iter()
            .map(|(key, bytes)| {
                serde_json::from_slice(&bytes).map_err(|e| {
                    SessionError::corrupt(session_id, format!("turn {}: {}", key.sequence, e))
                })
            })
            .collect()
    }
}
