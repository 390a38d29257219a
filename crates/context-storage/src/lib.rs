//! Storage layer for the context engine.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation for cache entries, turn logs, summaries and snapshots
//! - Sequence-suffixed turn keys for ordered per-session replay
//! - Time-prefixed snapshot keys for newest-first scans
//! - Atomic turn + summary writes via WriteBatch

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::{SnapshotKey, SummaryKey, TurnKey};
