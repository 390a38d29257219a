//! # context-session
//!
//! Per-session conversation state for the context engine.
//!
//! - A rolling window of the most recent turns (default 5); every turn is
//!   also appended to the persisted turn log, which is never trimmed.
//! - A [`SessionSummary`](context_types::SessionSummary) updated after every
//!   turn by deterministic extraction rules (see [`extract`]).
//! - A [`SessionSnapshot`](context_types::SessionSnapshot) written once when
//!   the session closes and loaded by later sessions at start-up.
//!
//! Sessions are handed out as `Arc<tokio::sync::Mutex<Session>>`; holding the
//! lock for the whole request is what serializes turns within one session.
//! Different sessions never contend.

pub mod error;
pub mod extract;
pub mod session;
pub mod store;

pub use error::SessionError;
pub use extract::{file_references, Extractor};
pub use session::{Session, HISTORY_SOURCE, SESSION_SOURCE};
pub use store::{SessionHandle, SessionHistoryStore};
