//! Name-keyed adapter lookup table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use context_types::Intent;
use tracing::{debug, info};

use crate::adapter::Adapter;
use crate::config::AdapterConfig;
use crate::error::AdapterError;

/// An adapter together with its effective registration settings.
#[derive(Clone)]
pub struct RegisteredAdapter {
    /// The adapter
    pub adapter: Arc<dyn Adapter>,
    /// Fast-tier intents
    pub intents: Vec<Intent>,
    /// Result cache TTL, if results are cached
    pub cache_ttl: Option<Duration>,
}

impl RegisteredAdapter {
    /// Adapter name.
    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    /// Whether this adapter is queried for `intent` on the Fast tier.
    pub fn is_eligible(&self, intent: Intent) -> bool {
        self.intents.contains(&intent)
    }
}

impl std::fmt::Debug for RegisteredAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAdapter")
            .field("name", &self.name())
            .field("intents", &self.intents)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

/// Adapters registered at start-up, in registration order.
#[derive(Debug, Default, Clone)]
pub struct AdapterRegistry {
    adapters: Vec<RegisteredAdapter>,
    by_name: HashMap<String, usize>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter with the settings it declares.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> Result<(), AdapterError> {
        self.register_with(adapter, AdapterConfig::default())
    }

    /// Register an adapter with configuration overrides.
    ///
    /// Disabled adapters are skipped. Names must be unique and non-empty.
    pub fn register_with(
        &mut self,
        adapter: Arc<dyn Adapter>,
        config: AdapterConfig,
    ) -> Result<(), AdapterError> {
        let name = adapter.name().trim().to_string();
        if name.is_empty() {
            return Err(AdapterError::config("adapter name must not be empty"));
        }
        if self.by_name.contains_key(&name) {
            return Err(AdapterError::config(format!(
                "adapter '{}' is already registered",
                name
            )));
        }
        if !config.is_enabled() {
            debug!(adapter = %name, "Adapter disabled, not registering");
            return Ok(());
        }

        let intents = config
            .intents
            .unwrap_or_else(|| adapter.eligible_intents().to_vec());
        let cache_ttl = match config.cache_ttl_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => adapter.cache_ttl(),
        };

        info!(adapter = %name, intents = ?intents, "Registered adapter");
        self.by_name.insert(name, self.adapters.len());
        self.adapters.push(RegisteredAdapter {
            adapter,
            intents,
            cache_ttl,
        });
        Ok(())
    }

    /// Look up an adapter by name.
    pub fn get(&self, name: &str) -> Option<&RegisteredAdapter> {
        self.by_name.get(name).map(|&i| &self.adapters[i])
    }

    /// All adapters, in registration order.
    pub fn all(&self) -> &[RegisteredAdapter] {
        &self.adapters
    }

    /// Adapters eligible for `intent` on the Fast tier, in registration order.
    pub fn eligible_for(&self, intent: Intent) -> Vec<RegisteredAdapter> {
        self.adapters
            .iter()
            .filter(|a| a.is_eligible(intent))
            .cloned()
            .collect()
    }

    /// Registered adapter names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapters are registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
