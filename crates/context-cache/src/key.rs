//! Cache keys: `{namespace}|{normalized query}`.

use std::fmt;

/// Normalize free text for use in a cache key.
///
/// Lowercases, collapses runs of whitespace and drops trailing sentence
/// punctuation, so "Tokio  Spawn?" and "tokio spawn" share a key.
pub fn normalize_query(query: &str) -> String {
    let collapsed = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(['?', '!', '.', ','])
        .trim_end()
        .to_string()
}

/// Key of one cache entry, composed from a namespace (usually the adapter
/// name) and a normalized query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from a namespace and free-text query.
    pub fn new(namespace: &str, query: &str) -> Self {
        Self(format!("{}|{}", namespace, normalize_query(query)))
    }

    /// Wrap an already-encoded key (as read back from storage).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The encoded key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace portion of the key.
    pub fn namespace(&self) -> &str {
        self.0.split('|').next().unwrap_or_default()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
