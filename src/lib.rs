//! prompt-cache-points: cache breakpoint placement for LLM prompt caching.
//!
//! Decides where in an ordered prompt (tools, system message, conversation
//! turns) to place provider cache breakpoints so that repeated prefixes are
//! reused across turns instead of being reprocessed:
//!   token thresholds → history reuse → fixed slot → incremental growth → eviction
//!
//! Entry point is [`cache::manager::CachePointManager`].

pub mod cache;
pub mod config;
pub mod estimator;
pub mod request;
pub mod store;

pub use cache::manager::{CachePointError, CachePointManager, CachePointOutcome};
pub use config::{CacheConfig, Config, Placement, ProviderConfig};
pub use request::{CachePoint, Message, Request, Role, ToolDefinition};
