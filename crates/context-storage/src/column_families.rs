//! Column family definitions for RocksDB.
//!
//! Each column family isolates data with different access patterns:
//! - cache_entries: Context cache entries (point reads, bulk warm-up scan)
//! - turns: Append-only per-session turn log (Universal compaction)
//! - summaries: Latest session summary per session (overwritten each turn)
//! - snapshots: Write-once session snapshots (reverse time scans)

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for context cache entries
pub const CF_CACHE_ENTRIES: &str = "cache_entries";

/// Column family name for the turn log
pub const CF_TURNS: &str = "turns";

/// Column family name for session summaries
pub const CF_SUMMARIES: &str = "summaries";

/// Column family name for session snapshots
pub const CF_SNAPSHOTS: &str = "snapshots";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_CACHE_ENTRIES, CF_TURNS, CF_SUMMARIES, CF_SNAPSHOTS];

/// Create column family options for the turn log (append-only, compressed)
fn turns_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts.set_compaction_style(rocksdb::DBCompactionStyle::Universal);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_CACHE_ENTRIES, Options::default()),
        ColumnFamilyDescriptor::new(CF_TURNS, turns_options()),
        ColumnFamilyDescriptor::new(CF_SUMMARIES, Options::default()),
        ColumnFamilyDescriptor::new(CF_SNAPSHOTS, Options::default()),
    ]
}
