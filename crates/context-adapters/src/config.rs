//! Per-adapter registration overrides.

use std::time::Duration;

use context_types::Intent;
use serde::{Deserialize, Serialize};

/// Configuration applied when an adapter is registered.
///
/// Unset fields fall back to what the adapter itself declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Whether this adapter is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Fast-tier intents, replacing `Adapter::eligible_intents`.
    #[serde(default)]
    pub intents: Option<Vec<Intent>>,

    /// Result cache TTL in seconds, replacing `Adapter::cache_ttl`.
    /// Zero disables caching.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intents: None,
            cache_ttl_secs: None,
        }
    }
}

impl AdapterConfig {
    /// Override the Fast-tier intents.
    pub fn with_intents(mut self, intents: Vec<Intent>) -> Self {
        self.intents = Some(intents);
        self
    }

    /// Override the result cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = Some(ttl.as_secs());
        self
    }

    /// Disable the adapter.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Check if the adapter is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
