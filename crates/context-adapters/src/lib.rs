//! # context-adapters
//!
//! Adapter SDK for pluggable context sources.
//!
//! Every external data source (code search, task board, notes, documentation
//! lookup) is wrapped in one [`Adapter`] and registered by name. The engine
//! treats all adapters identically: it only calls [`Adapter::fetch`] with a
//! [`FetchRequest`] carrying the query, extracted entities, a hard deadline
//! and a cancellation token.
//!
//! ## Core Components
//!
//! - [`Adapter`]: Trait that all adapters must implement
//! - [`AdapterRegistry`]: Name-keyed lookup table built at start-up
//! - [`AdapterConfig`]: Per-adapter overrides applied at registration
//! - [`AdapterError`]: Timeout / failure / cancellation markers
//! - [`DocsAdapter`]: Resolve-then-fetch documentation adapter backed by the context cache
//! - [`StaticAdapter`]: Fixture adapter returning canned items
//!
//! ## Usage
//!
//! ```rust,ignore
//! use context_adapters::{Adapter, AdapterError, FetchRequest};
//! use context_types::{ContextItem, Intent};
//!
//! struct TaskBoard;
//!
//! #[async_trait::async_trait]
//! impl Adapter for TaskBoard {
//!     fn name(&self) -> &str { "tasks" }
//!     fn eligible_intents(&self) -> &[Intent] { &[Intent::Implementation, Intent::Planning] }
//!     async fn fetch(&self, request: &FetchRequest) -> Result<Vec<ContextItem>, AdapterError> {
//!         request.within_budget(async { Ok(vec![]) }).await
//!     }
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod docs;
pub mod error;
pub mod registry;
pub mod static_adapter;

// Re-export main types at crate root
pub use adapter::{Adapter, FetchRequest};
pub use config::AdapterConfig;
pub use docs::{DocsAdapter, DocsSource};
pub use error::AdapterError;
pub use registry::{AdapterRegistry, RegisteredAdapter};
pub use static_adapter::StaticAdapter;
