//! Configuration loading for the context engine.
//!
//! Layered config: defaults -> config file -> env vars.
//! The default config file lives at ~/.config/context-engine/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ContextError;

/// Context cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Entry count that triggers eviction
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// TTL applied when a caller does not pass one
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Share of entries (oldest first) removed per eviction pass
    #[serde(default = "default_evict_fraction")]
    pub evict_fraction: f32,
}

fn default_cache_max_entries() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_evict_fraction() -> f32 {
    0.10
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            default_ttl_secs: default_cache_ttl_secs(),
            evict_fraction: default_evict_fraction(),
        }
    }
}

impl CacheSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("cache.max_entries must be > 0".to_string());
        }
        if !(self.evict_fraction > 0.0 && self.evict_fraction <= 1.0) {
            return Err(format!(
                "cache.evict_fraction must be in (0.0, 1.0], got {}",
                self.evict_fraction
            ));
        }
        Ok(())
    }
}

/// Session history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Number of recent turns kept in the rolling window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Bound on summary topics
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,

    /// Bound on summary decisions
    #[serde(default = "default_max_decisions")]
    pub max_decisions: usize,

    /// Bound on summary file scope
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Topics copied into a snapshot
    #[serde(default = "default_snapshot_topics")]
    pub snapshot_topics: usize,

    /// Decisions copied into a snapshot
    #[serde(default = "default_snapshot_decisions")]
    pub snapshot_decisions: usize,

    /// Files copied into a snapshot
    #[serde(default = "default_snapshot_files")]
    pub snapshot_files: usize,

    /// Prior snapshots loaded when a new session starts
    #[serde(default = "default_recent_sessions")]
    pub recent_sessions: usize,
}

fn default_window_size() -> usize {
    5
}

fn default_max_topics() -> usize {
    20
}

fn default_max_decisions() -> usize {
    10
}

fn default_max_files() -> usize {
    30
}

fn default_snapshot_topics() -> usize {
    5
}

fn default_snapshot_decisions() -> usize {
    3
}

fn default_snapshot_files() -> usize {
    10
}

fn default_recent_sessions() -> usize {
    3
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            max_topics: default_max_topics(),
            max_decisions: default_max_decisions(),
            max_files: default_max_files(),
            snapshot_topics: default_snapshot_topics(),
            snapshot_decisions: default_snapshot_decisions(),
            snapshot_files: default_snapshot_files(),
            recent_sessions: default_recent_sessions(),
        }
    }
}

impl SessionSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("session.window_size must be > 0".to_string());
        }
        if self.max_topics == 0 || self.max_decisions == 0 || self.max_files == 0 {
            return Err("session bounds must be > 0".to_string());
        }
        Ok(())
    }
}

/// Escalation and fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingSettings {
    /// Deadline for the whole Fast tier fan-out
    #[serde(default = "default_fast_deadline_ms")]
    pub fast_deadline_ms: u64,

    /// Shared deadline for the Slow tier fan-out
    #[serde(default = "default_slow_deadline_ms")]
    pub slow_deadline_ms: u64,

    /// Most adapters queried on the Fast tier
    #[serde(default = "default_max_fast_adapters")]
    pub max_fast_adapters: usize,

    /// Longest request (in words) still treated as a continuation
    #[serde(default = "default_continuation_max_words")]
    pub continuation_max_words: usize,

    /// Requests longer than this (in words) go to the Slow tier
    #[serde(default = "default_slow_word_threshold")]
    pub slow_word_threshold: usize,

    /// Requests with more entities than this go to the Slow tier
    #[serde(default = "default_max_entities")]
    pub max_entities: usize,

    /// Classifications below this confidence go to the Slow tier
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Score gap under which two intents are considered competing
    #[serde(default = "default_competing_epsilon")]
    pub competing_epsilon: f32,
}

fn default_fast_deadline_ms() -> u64 {
    500
}

fn default_slow_deadline_ms() -> u64 {
    5000
}

fn default_max_fast_adapters() -> usize {
    4
}

fn default_continuation_max_words() -> usize {
    6
}

fn default_slow_word_threshold() -> usize {
    200
}

fn default_max_entities() -> usize {
    5
}

fn default_min_confidence() -> f32 {
    0.5
}

fn default_competing_epsilon() -> f32 {
    0.05
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            fast_deadline_ms: default_fast_deadline_ms(),
            slow_deadline_ms: default_slow_deadline_ms(),
            max_fast_adapters: default_max_fast_adapters(),
            continuation_max_words: default_continuation_max_words(),
            slow_word_threshold: default_slow_word_threshold(),
            max_entities: default_max_entities(),
            min_confidence: default_min_confidence(),
            competing_epsilon: default_competing_epsilon(),
        }
    }
}

impl RoutingSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.fast_deadline_ms == 0 || self.slow_deadline_ms == 0 {
            return Err("routing deadlines must be > 0".to_string());
        }
        if self.fast_deadline_ms > self.slow_deadline_ms {
            return Err(format!(
                "routing.fast_deadline_ms ({}) must not exceed slow_deadline_ms ({})",
                self.fast_deadline_ms, self.slow_deadline_ms
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(format!(
                "routing.min_confidence must be 0.0-1.0, got {}",
                self.min_confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.competing_epsilon) {
            return Err(format!(
                "routing.competing_epsilon must be 0.0-1.0, got {}",
                self.competing_epsilon
            ));
        }
        Ok(())
    }
}

/// Briefing output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefingSettings {
    /// Most items included in one briefing
    #[serde(default = "default_budget_items")]
    pub budget_items: usize,

    /// Body preview length when rendering
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,
}

fn default_budget_items() -> usize {
    12
}

fn default_max_body_chars() -> usize {
    1200
}

impl Default for BriefingSettings {
    fn default() -> Self {
        Self {
            budget_items: default_budget_items(),
            max_body_chars: default_max_body_chars(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Context cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Session history settings
    #[serde(default)]
    pub session: SessionSettings,

    /// Escalation and fan-out settings
    #[serde(default)]
    pub routing: RoutingSettings,

    /// Briefing output settings
    #[serde(default)]
    pub briefing: BriefingSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "context-engine")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            cache: CacheSettings::default(),
            session: SessionSettings::default(),
            routing: RoutingSettings::default(),
            briefing: BriefingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/context-engine/config.toml)
    /// 3. Explicit config file (optional)
    /// 4. Environment variables (CONTEXT_*, nested keys joined with `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self, ContextError> {
        let config_dir = ProjectDirs::from("", "", "context-engine")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| ContextError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| ContextError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: CONTEXT_LOG_LEVEL, CONTEXT_ROUTING__FAST_DEADLINE_MS, etc.
        builder = builder.add_source(
            Environment::with_prefix("CONTEXT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ContextError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| ContextError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ContextError> {
        self.cache.validate().map_err(ContextError::Config)?;
        self.session.validate().map_err(ContextError::Config)?;
        self.routing.validate().map_err(ContextError::Config)?;
        if self.briefing.budget_items == 0 {
            return Err(ContextError::Config(
                "briefing.budget_items must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Expand ~ in db_path to the home directory.
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new() {
                return home.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}
