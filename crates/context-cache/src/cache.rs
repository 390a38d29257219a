//! TTL cache with ceiling eviction and optional write-through persistence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use context_storage::{Storage, StorageError};
use context_types::{CacheSettings, ContextItem};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::key::CacheKey;

/// One stored value and its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Serialized value (JSON text)
    pub value: String,
    /// When the value was stored
    pub cached_at: DateTime<Utc>,
    /// Lifetime in milliseconds
    pub ttl_ms: u64,
}

impl CacheEntry {
    fn new(value: String, cached_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            cached_at,
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    /// An entry is expired from `cached_at + ttl` onwards.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age_ms = (now - self.cached_at).num_milliseconds().max(0) as u64;
        age_ms >= self.ttl_ms
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub corrupt: u64,
    pub evicted: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    corrupt: AtomicU64,
    evicted: AtomicU64,
}

enum Lookup {
    Hit(String),
    Expired,
    Absent,
}

/// Key-value cache shared by every adapter of one engine.
///
/// ## Thread Safety
///
/// - Entries live in a DashMap; the entry API gives per-key atomic
///   insert-or-ignore.
/// - Eviction passes are serialized by a Mutex so two writers crossing the
///   ceiling together do not both evict.
pub struct ContextCache {
    entries: DashMap<String, CacheEntry>,
    settings: CacheSettings,
    storage: Option<Arc<Storage>>,
    counters: Counters,
    evict_lock: Mutex<()>,
}

impl ContextCache {
    /// Create an in-memory cache.
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            entries: DashMap::new(),
            settings,
            storage: None,
            counters: Counters::default(),
            evict_lock: Mutex::new(()),
        }
    }

    /// Create with default settings.
    pub fn with_defaults() -> Self {
        Self::new(CacheSettings::default())
    }

    /// Create a cache that mirrors writes to storage, warmed from the
    /// entries already stored there. Expired and corrupt stored entries are
    /// deleted during warm-up.
    pub fn with_storage(
        settings: CacheSettings,
        storage: Arc<Storage>,
    ) -> Result<Self, StorageError> {
        let now = Utc::now();
        let mut cache = Self::new(settings);
        let mut stale = Vec::new();

        for (key, bytes) in storage.cache_entries()? {
            match serde_json::from_slice::<CacheEntry>(&bytes) {
                Ok(entry) if !entry.is_expired(now) => {
                    cache.entries.insert(key, entry);
                }
                Ok(_) => stale.push(key),
                Err(e) => {
                    warn!(key = %key, error = %e, "Dropping corrupt stored cache entry");
                    cache.counters.corrupt.fetch_add(1, Ordering::Relaxed);
                    stale.push(key);
                }
            }
        }

        if !stale.is_empty() {
            storage.delete_cache_entries(stale.iter().map(String::as_str))?;
        }

        info!(
            loaded = cache.entries.len(),
            dropped = stale.len(),
            "Warmed context cache from storage"
        );

        cache.storage = Some(storage);
        cache.evict_if_needed();
        Ok(cache)
    }

    /// TTL used when callers have no specific lifetime.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.default_ttl_secs)
    }

    /// Look up a raw value. Expired entries are misses and are removed.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        match self.lookup(key) {
            Lookup::Hit(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Lookup::Expired | Lookup::Absent => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a raw value unless a live entry already holds the key.
    ///
    /// Returns true when the value was written.
    pub fn put(&self, key: &CacheKey, value: impl Into<String>, ttl: Duration) -> bool {
        let entry = CacheEntry::new(value.into(), Utc::now(), ttl);
        self.insert_entry(key, entry)
    }

    /// Look up a list of context items.
    ///
    /// A stored value that does not deserialize is dropped and reported as
    /// a miss.
    pub fn get_items(&self, key: &CacheKey) -> Option<Vec<ContextItem>> {
        let value = match self.lookup(key) {
            Lookup::Hit(value) => value,
            Lookup::Expired | Lookup::Absent => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match serde_json::from_str::<Vec<ContextItem>>(&value) {
            Ok(items) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, items = items.len(), "Cache hit");
                Some(items)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping corrupt cache entry");
                self.counters.corrupt.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.remove(key);
                None
            }
        }
    }

    /// Store a list of context items.
    pub fn put_items(&self, key: &CacheKey, items: &[ContextItem], ttl: Duration) -> bool {
        match serde_json::to_string(items) {
            Ok(value) => self.put(key, value, ttl),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize context items");
                false
            }
        }
    }

    /// Remove an entry.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let removed = self.entries.remove(key.as_str()).is_some();
        if removed {
            self.unpersist(&[key.as_str().to_string()]);
        }
        removed
    }

    /// Number of entries currently held (including not-yet-detected expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            corrupt: self.counters.corrupt.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Lookup {
        let now = Utc::now();
        let found = self
            .entries
            .get(key.as_str())
            .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));

        match found {
            Some(Some(value)) => Lookup::Hit(value),
            Some(None) => {
                if self
                    .entries
                    .remove_if(key.as_str(), |_, entry| entry.is_expired(now))
                    .is_some()
                {
                    self.counters.expired.fetch_add(1, Ordering::Relaxed);
                    self.unpersist(&[key.as_str().to_string()]);
                }
                debug!(key = %key, "Cache entry expired");
                Lookup::Expired
            }
            None => Lookup::Absent,
        }
    }

    fn insert_entry(&self, key: &CacheKey, entry: CacheEntry) -> bool {
        let now = Utc::now();
        let inserted = match self.entries.entry(key.as_str().to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(entry.clone());
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry.clone());
                true
            }
        };

        if inserted {
            self.persist(key, &entry);
            self.evict_if_needed();
        } else {
            debug!(key = %key, "Live entry present, ignoring duplicate write");
        }
        inserted
    }

    fn evict_if_needed(&self) {
        if self.entries.len() <= self.settings.max_entries {
            return;
        }

        let _guard = self
            .evict_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let len = self.entries.len();
        if len <= self.settings.max_entries {
            return;
        }

        let count = ((len as f32 * self.settings.evict_fraction).ceil() as usize).max(1);

        let mut by_age: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().cached_at))
            .collect();
        by_age.sort_by_key(|(_, cached_at)| *cached_at);

        let victims: Vec<String> = by_age.into_iter().take(count).map(|(k, _)| k).collect();
        for key in &victims {
            self.entries.remove(key);
        }

        self.counters
            .evicted
            .fetch_add(victims.len() as u64, Ordering::Relaxed);
        info!(
            evicted = victims.len(),
            remaining = self.entries.len(),
            ceiling = self.settings.max_entries,
            "Evicted oldest cache entries"
        );

        self.unpersist(&victims);
    }

    fn persist(&self, key: &CacheKey, entry: &CacheEntry) {
        let Some(storage) = &self.storage else {
            return;
        };
        let result = serde_json::to_vec(entry)
            .map_err(StorageError::from)
            .and_then(|bytes| storage.put_cache_entry(key.as_str(), &bytes));
        if let Err(e) = result {
            warn!(key = %key, error = %e, "Failed to persist cache entry");
        }
    }

    fn unpersist(&self, keys: &[String]) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(e) = storage.delete_cache_entries(keys.iter().map(String::as_str)) {
            warn!(error = %e, "Failed to delete persisted cache entries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_types::ItemKind;
    use tempfile::TempDir;

    fn small_cache(max_entries: usize) -> ContextCache {
        ContextCache::new(CacheSettings {
            max_entries,
            ..Default::default()
        })
    }

    fn sample_items() -> Vec<ContextItem> {
        vec![ContextItem::new("docs", ItemKind::ExternalDoc, "tokio::spawn", "Spawns a task")
            .with_locator("https://docs.rs/tokio/latest/tokio/fn.spawn.html")
            .with_score(0.9)]
    }

    #[test]
    fn test_get_after_put_hits() {
        let cache = ContextCache::with_defaults();
        let key = CacheKey::new("search", "login handler");

        assert!(cache.put(&key, "[]", Duration::from_secs(60)));
        assert_eq!(cache.get(&key), Some("[]".to_string()));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_get_after_ttl_misses_and_removes() {
        let cache = ContextCache::with_defaults();
        let key = CacheKey::new("search", "login handler");

        cache.put(&key, "[]", Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let cache = ContextCache::with_defaults();
        let key = CacheKey::new("search", "anything");
        cache.put(&key, "[]", Duration::ZERO);
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn test_duplicate_put_is_ignored_while_live() {
        let cache = ContextCache::with_defaults();
        let key = CacheKey::new("docs", "tokio");

        assert!(cache.put(&key, "first", Duration::from_secs(60)));
        assert!(!cache.put(&key, "second", Duration::from_secs(60)));
        assert_eq!(cache.get(&key), Some("first".to_string()));
    }

    #[test]
    fn test_put_replaces_expired_entry() {
        let cache = ContextCache::with_defaults();
        let key = CacheKey::new("docs", "tokio");

        cache.put(&key, "stale", Duration::ZERO);
        assert!(cache.put(&key, "fresh", Duration::from_secs(60)));
        assert_eq!(cache.get(&key), Some("fresh".to_string()));
    }

    #[test]
    fn test_items_roundtrip_through_cache() {
        let cache = ContextCache::with_defaults();
        let key = CacheKey::new("docs", "tokio spawn");

        cache.put_items(&key, &sample_items(), Duration::from_secs(60));
        let items = cache.get_items(&key).unwrap();
        assert_eq!(items, sample_items());
    }

    #[test]
    fn test_corrupt_entry_is_dropped_as_miss() {
        let cache = ContextCache::with_defaults();
        let key = CacheKey::new("docs", "broken");

        cache.put(&key, "{not json", Duration::from_secs(60));
        assert!(cache.get_items(&key).is_none());
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.corrupt, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_eviction_removes_oldest_tenth() {
        let cache = small_cache(10);
        let base = Utc::now();

        for i in 0..10 {
            let entry = CacheEntry::new(
                format!("v{}", i),
                base + chrono::Duration::milliseconds(i),
                Duration::from_secs(600),
            );
            cache.insert_entry(&CacheKey::new("k", &i.to_string()), entry);
        }
        assert_eq!(cache.len(), 10);

        // 11th entry crosses the ceiling: ceil(11 * 0.1) = 2 oldest removed
        let entry = CacheEntry::new(
            "v10".to_string(),
            base + chrono::Duration::milliseconds(10),
            Duration::from_secs(600),
        );
        cache.insert_entry(&CacheKey::new("k", "10"), entry);

        assert_eq!(cache.len(), 9);
        assert_eq!(cache.stats().evicted, 2);
        assert!(cache.get(&CacheKey::new("k", "0")).is_none());
        assert!(cache.get(&CacheKey::new("k", "1")).is_none());
        assert!(cache.get(&CacheKey::new("k", "2")).is_some());
        assert!(cache.get(&CacheKey::new("k", "10")).is_some());
    }

    #[test]
    fn test_concurrent_duplicate_writes_are_harmless() {
        let cache = Arc::new(ContextCache::with_defaults());
        let key = CacheKey::new("docs", "serde");

        let written: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let cache = cache.clone();
                    let key = key.clone();
                    scope.spawn(move || cache.put(&key, format!("v{}", i), Duration::from_secs(60)))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(written, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_write_through_and_warm_up() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let key = CacheKey::new("docs", "tokio spawn");

        {
            let cache =
                ContextCache::with_storage(CacheSettings::default(), storage.clone()).unwrap();
            cache.put_items(&key, &sample_items(), Duration::from_secs(600));
            cache.put(&CacheKey::new("docs", "short lived"), "[]", Duration::ZERO);
        }
        storage.put_cache_entry("docs|garbage", b"not an entry").unwrap();

        let cache = ContextCache::with_storage(CacheSettings::default(), storage.clone()).unwrap();
        assert_eq!(cache.get_items(&key), Some(sample_items()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().corrupt, 1);

        // Expired and corrupt rows were cleaned out of storage
        assert_eq!(storage.cache_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let now = Utc::now();
        let entry = CacheEntry::new("v".to_string(), now, Duration::from_millis(100));
        assert!(!entry.is_expired(now));
        assert!(!entry.is_expired(now + chrono::Duration::milliseconds(99)));
        assert!(entry.is_expired(now + chrono::Duration::milliseconds(100)));
    }
}
