//! # context-retrieval
//!
//! The context engine proper: decides how much effort a request deserves,
//! fans out to adapters within a latency budget, and merges the results into
//! one bounded briefing.
//!
//! ## Core Concepts
//!
//! - **Intent**: What the request needs (debugging, planning, implementation,
//!   research, continuation), scored by keyword heuristics
//! - **Tier**: Hot (session state only), Fast (intent-specific adapter subset,
//!   500ms), or Slow (every adapter plus prior sessions, 5s)
//! - **Fan-out**: One spawned task per adapter, collected with a bounded wait;
//!   stragglers are abandoned and reported as unavailable
//! - **Briefing**: Round-robin selection across sources so no single adapter
//!   crowds out the others
//!
//! ## Usage
//!
//! ```rust,ignore
//! use context_retrieval::{init_tracing, ContextEngine};
//! use context_adapters::AdapterRegistry;
//! use context_types::Settings;
//!
//! let settings = Settings::load(None)?;
//! init_tracing(&settings)?;
//!
//! let mut registry = AdapterRegistry::new();
//! registry.register(search_adapter)?;
//!
//! let engine = ContextEngine::open(settings, registry)?;
//! let briefing = engine.gather("session-1", "Why is login failing with a 401?").await?;
//! println!("{}", briefing.render());
//!
//! engine.close_session("session-1").await?;
//! ```
//!
//! ## Modules
//!
//! - [`classifier`]: Intent classification and entity extraction
//! - [`escalation`]: Tier selection rules
//! - [`router`]: Concurrent adapter fan-out
//! - [`assembler`]: Dedupe, ranking and rendering
//! - [`engine`]: The `gather` entry point

pub mod assembler;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod router;

// Re-export main types at crate root
pub use assembler::{Briefing, BriefingAssembler, BriefingSection};
pub use classifier::{ClassificationResult, ClassifierConfig, IntentClassifier, IntentScore};
pub use engine::{init_tracing, ContextEngine};
pub use error::EngineError;
pub use escalation::{EscalationPolicy, EscalationReason, TierDecision};
pub use router::{FanOut, SourceItems, SourceReport, SourceStatus, TieredRouter, UnavailableSource};
