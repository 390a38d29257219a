//! RocksDB wrapper for context engine storage.
//!
//! Provides:
//! - Database open with column family setup
//! - Atomic turn + summary writes
//! - Per-session turn replay
//! - Newest-first snapshot scans
//! - Cache entry persistence

use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::column_families::{
    build_cf_descriptors, CF_CACHE_ENTRIES, CF_SNAPSHOTS, CF_SUMMARIES, CF_TURNS,
};
use crate::error::StorageError;
use crate::keys::{SnapshotKey, SummaryKey, TurnKey};

/// Main storage interface for the context engine
pub struct Storage {
    db: DB,
}

/// Row counts per column family
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub cache_entries: usize,
    pub turns: usize,
    pub summaries: usize,
    pub snapshots: usize,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(2);

        let db = DB::open_cf_descriptors(&db_opts, path, build_cf_descriptors())?;
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    // ==================== Turn Log Methods ====================

    /// Append a turn and replace the session summary in one atomic write.
    pub fn append_turn(
        &self,
        key: &TurnKey,
        turn_bytes: &[u8],
        summary_bytes: &[u8],
    ) -> Result<(), StorageError> {
        let turns_cf = self.cf(CF_TURNS)?;
        let summaries_cf = self.cf(CF_SUMMARIES)?;
        let summary_key = SummaryKey::new(key.session_id.clone());

        let mut batch = WriteBatch::default();
        batch.put_cf(turns_cf, key.to_bytes(), turn_bytes);
        batch.put_cf(summaries_cf, summary_key.to_bytes(), summary_bytes);
        self.db.write(batch)?;

        debug!(
            session_id = %key.session_id,
            sequence = key.sequence,
            "Appended turn"
        );
        Ok(())
    }

    /// Read the full turn log of a session, oldest first.
    pub fn get_turns(&self, session_id: &str) -> Result<Vec<(TurnKey, Vec<u8>)>, StorageError> {
        let cf = self.cf(CF_TURNS)?;
        let prefix = TurnKey::session_prefix(session_id);

        let mut results = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            results.push((TurnKey::from_bytes(&key)?, value.to_vec()));
        }
        Ok(results)
    }

    /// Get the latest stored summary of a session.
    pub fn get_summary(&self, session_id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(CF_SUMMARIES)?;
        let key = SummaryKey::new(session_id);
        Ok(self.db.get_cf(cf, key.to_bytes())?)
    }

    // ==================== Snapshot Methods ====================

    /// Store a session snapshot.
    pub fn put_snapshot(&self, key: &SnapshotKey, bytes: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(CF_SNAPSHOTS)?;
        self.db.put_cf(cf, key.to_bytes(), bytes)?;
        debug!(session_id = %key.session_id, ended_at_ms = key.ended_at_ms, "Stored snapshot");
        Ok(())
    }

    /// Get up to `limit` snapshots, newest first.
    ///
    /// Rows whose key does not decode are skipped with a warning.
    pub fn recent_snapshots(
        &self,
        limit: usize,
    ) -> Result<Vec<(SnapshotKey, Vec<u8>)>, StorageError> {
        let cf = self.cf(CF_SNAPSHOTS)?;

        let mut results = Vec::with_capacity(limit);
        for item in self.db.iterator_cf(cf, IteratorMode::End) {
            if results.len() >= limit {
                break;
            }
            let (key, value) = item?;
            match SnapshotKey::from_bytes(&key) {
                Ok(key) => results.push((key, value.to_vec())),
                Err(e) => warn!(
                    key = %String::from_utf8_lossy(&key),
                    error = %e,
                    "Skipping snapshot with malformed key"
                ),
            }
        }
        Ok(results)
    }

    // ==================== Cache Entry Methods ====================

    /// Store a serialized cache entry.
    pub fn put_cache_entry(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(CF_CACHE_ENTRIES)?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    /// Remove cache entries.
    pub fn delete_cache_entries<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), StorageError> {
        let cf = self.cf(CF_CACHE_ENTRIES)?;
        let mut batch = WriteBatch::default();
        for key in keys {
            batch.delete_cf(cf, key.as_bytes());
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// Read every stored cache entry. Keys that are not UTF-8 are skipped.
    pub fn cache_entries(&self) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let cf = self.cf(CF_CACHE_ENTRIES)?;
        let mut results = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            match String::from_utf8(key.to_vec()) {
                Ok(key) => results.push((key, value.to_vec())),
                Err(_) => debug!("Skipping non-UTF-8 cache key"),
            }
        }
        Ok(results)
    }

    // ==================== Stats ====================

    /// Count rows in each column family.
    pub fn stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            cache_entries: self.count_cf(CF_CACHE_ENTRIES)?,
            turns: self.count_cf(CF_TURNS)?,
            summaries: self.count_cf(CF_SUMMARIES)?,
            snapshots: self.count_cf(CF_SNAPSHOTS)?,
        })
    }

    fn count_cf(&self, name: &str) -> Result<usize, StorageError> {
        let cf = self.cf(name)?;
        let mut count = 0;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}
