//! # context-types
//!
//! Shared domain types for the context-assembly engine.
//!
//! This crate defines the data structures passed between the engine crates:
//! - Context items: attributable units of retrieved information
//! - Intents and tiers: classifier output and processing tier
//! - Turns, session summaries and snapshots: per-session history
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use context_types::{ContextItem, ItemKind};
//!
//! let item = ContextItem::new("search", ItemKind::CodeReference, "login handler", "fn login() {}")
//!     .with_locator("src/auth.rs:42")
//!     .with_score(0.8);
//! assert_eq!(item.locator, "src/auth.rs:42");
//! ```

pub mod config;
pub mod error;
pub mod intent;
pub mod item;
pub mod session;

pub use config::{
    BriefingSettings, CacheSettings, RoutingSettings, SessionSettings, Settings,
};
pub use error::ContextError;
pub use intent::{Intent, Tier};
pub use item::{ContextItem, ItemKind, MAX_BODY_CHARS};
pub use session::{SessionSnapshot, SessionSummary, Turn};
