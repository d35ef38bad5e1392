//! Runtime configuration for prompt-cache-points.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! All placement knobs (breakpoint budget, token thresholds, store TTL) live here.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "prompt-cache-points",
    about = "Replay LLM requests through the cache breakpoint planner"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Request files (JSON), replayed in order as turns of one conversation.
    #[arg(required = true)]
    pub requests: Vec<PathBuf>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_cache_points must be at least 1")]
    ZeroMaxCachePoints,

    #[error("refresh_point_min_tokens must be at least 1")]
    ZeroRefreshPointMinTokens,

    #[error("chars_per_token must be at least 1")]
    ZeroCharsPerToken,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Breakpoint placement policy.
    pub cache: CacheConfig,

    /// Provider capabilities.
    pub provider: ProviderConfig,

    /// Conversation record store.
    pub store: StoreConfig,

    /// Bundled token estimator settings.
    pub estimator: EstimatorConfig,
}

/// Breakpoint placement policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum simultaneous breakpoints the provider accepts.
    pub max_cache_points: usize,

    /// Below this many total tokens nothing is cached.
    pub min_cache_tokens: usize,

    /// Uncached tokens required before spending a new trailing breakpoint.
    pub refresh_point_min_tokens: usize,

    /// Reserved for hit-count based promotion; not consulted.
    pub min_hit_count: usize,

    /// TTL of persisted conversation records.
    pub cache_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_cache_points: 4,
            min_cache_tokens: 2048,
            refresh_point_min_tokens: 5000,
            min_hit_count: 3,
            cache_ttl_seconds: 7200,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cache_points == 0 {
            return Err(ConfigError::ZeroMaxCachePoints);
        }
        if self.refresh_point_min_tokens == 0 {
            return Err(ConfigError::ZeroRefreshPointMinTokens);
        }
        Ok(())
    }
}

/// How a provider lets us place breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Several breakpoints, chosen from conversation history.
    #[default]
    Dynamic,
    /// A single breakpoint, always on the last message.
    Auto,
    /// A single breakpoint, chosen by the caller's own markers.
    Manual,
}

/// Provider capabilities relevant to caching.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub placement: Placement,

    /// Model name prefixes that support caching (empty = all models).
    pub cacheable_models: Vec<String>,

    /// TTL hint attached to every emitted marker (e.g. "1h").
    pub cache_ttl_hint: Option<String>,
}

impl ProviderConfig {
    pub fn supports_caching(&self, model: &str) -> bool {
        self.cacheable_models.is_empty()
            || self
                .cacheable_models
                .iter()
                .any(|prefix| model.starts_with(prefix.as_str()))
    }
}

/// Where conversation records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Directory for the file backend.
    pub path: PathBuf,

    /// Prefix prepended to every fingerprint to form the store key.
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("/tmp/prompt-cache-points"),
            key_prefix: "prompt_cache:".to_string(),
        }
    }
}

/// Settings for the bundled characters-per-token estimator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub chars_per_token: usize,

    /// Tokens added to every non-empty segment.
    pub segment_overhead: usize,

    /// Refuse content larger than this many bytes (0 = unlimited).
    pub max_content_bytes: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            segment_overhead: 0,
            max_content_bytes: 0,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let config = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str::<Config>(&data)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        if self.estimator.chars_per_token == 0 {
            return Err(ConfigError::ZeroCharsPerToken);
        }
        Ok(())
    }
}
