//! Context cache for expensive adapter lookups.
//!
//! ## Key Design Principles
//!
//! - **TTL on read**: an entry read at or after `cached_at + ttl` is a miss
//!   and is removed on the spot; there is no background sweeper.
//! - **Insert-or-ignore**: a write for a key that already holds a live entry
//!   is dropped, so racing duplicate writes from one fan-out are harmless.
//! - **Ceiling eviction**: once the entry count exceeds `max_entries`, the
//!   oldest `evict_fraction` of entries (by `cached_at`) are removed in one
//!   synchronous pass.
//! - **Corrupt entries are misses**: a value that fails to deserialize into
//!   context items is dropped and counted.
//! - **Optional write-through**: when built over [`Storage`], writes and
//!   removals are mirrored to the cache column family and the cache warms
//!   from it at start-up.

mod cache;
mod key;

pub use cache::{CacheEntry, CacheStats, ContextCache};
pub use key::{normalize_query, CacheKey};

pub use context_storage::Storage;
