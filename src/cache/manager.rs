//! Cache point manager: decides and applies breakpoints for one request.
//!
//! The manager is the top-level component that:
//! 1. Resets any cache markers already on the request
//! 2. Makes sure every segment has a token estimate
//! 3. Builds the segment model and picks a strategy
//! 4. Writes the chosen breakpoints back onto the request
//! 5. Persists the conversation record for the next turn
//!
//! Store failures never fail the request: a failed read is a miss, a failed
//! write is logged and reported in the outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::record::ConversationCacheRecord;
use crate::cache::segment::SegmentModel;
use crate::cache::strategy::{Strategy, StrategyContext};
use crate::config::{CacheConfig, Config, ConfigError, ProviderConfig};
use crate::estimator::{CharRatioEstimator, EstimateError, TokenEstimator};
use crate::request::{CachePoint, Request};
use crate::store::{open_store, SharedStore};

#[derive(Error, Debug)]
pub enum CachePointError {
    #[error("Token estimation failed: {0}")]
    Estimate(#[from] EstimateError),
}

/// What the manager decided for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachePointOutcome {
    pub strategy: Strategy,
    pub fingerprint: String,
    pub breakpoints: Vec<usize>,
    pub total_tokens: usize,
    pub history_reused: bool,
    pub persisted: bool,
}

/// Running counters, readable while requests are in flight.
#[derive(Debug, Default)]
pub struct ManagerStats {
    pub requests: AtomicU64,
    pub history_hits: AtomicU64,
    pub history_misses: AtomicU64,
    pub store_errors: AtomicU64,
    pub breakpoints_placed: AtomicU64,
}

/// Plain copy of [`ManagerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub history_hits: u64,
    pub history_misses: u64,
    pub store_errors: u64,
    pub breakpoints_placed: u64,
}

impl ManagerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            history_hits: self.history_hits.load(Ordering::Relaxed),
            history_misses: self.history_misses.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            breakpoints_placed: self.breakpoints_placed.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

/// The cache point manager.
pub struct CachePointManager {
    cache: CacheConfig,
    provider: ProviderConfig,
    store: SharedStore,
    estimator: Arc<dyn TokenEstimator>,
    key_prefix: String,
    stats: ManagerStats,
}

impl CachePointManager {
    /// Create a manager. Invalid policy is rejected here, not per request.
    pub fn new(
        cache: CacheConfig,
        provider: ProviderConfig,
        store: SharedStore,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Result<Self, ConfigError> {
        cache.validate()?;
        Ok(Self {
            cache,
            provider,
            store,
            estimator,
            key_prefix: String::new(),
            stats: ManagerStats::default(),
        })
    }

    /// Build the store and estimator named in `config`.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;
        let store = open_store(&config.store).await?;
        let estimator = Arc::new(CharRatioEstimator::from_config(&config.estimator));
        let manager = Self::new(config.cache.clone(), config.provider.clone(), store, estimator)?
            .with_key_prefix(config.store.key_prefix.clone());
        Ok(manager)
    }

    /// Builder: namespace store keys.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Decide breakpoints for `request` and mark them on it in place.
    pub async fn configure_cache_points(
        &self,
        request: &mut Request,
    ) -> Result<CachePointOutcome, CachePointError> {
        bump(&self.stats.requests, 1);

        let requested = request.requested_cache_points();
        request.reset_cache_points();

        if !request.has_token_estimates() {
            request.calculate_token_estimates(self.estimator.as_ref())?;
        }

        let segments = SegmentModel::from_request(request);
        let total_tokens = segments.total_tokens();
        let fingerprint = segments.fingerprint(request.model());
        let key = format!("{}{fingerprint}", self.key_prefix);

        let strategy = Strategy::select(total_tokens, request.model(), &self.cache, &self.provider);
        debug!(%strategy, total_tokens, segments = segments.len(), "Selected strategy");

        let history = match strategy {
            Strategy::Dynamic => self.load_record(&key, &fingerprint).await,
            _ => None,
        };

        let ctx = StrategyContext {
            segments: &segments,
            cacheable: self.provider.supports_caching(request.model()),
            requested: &requested,
            history: history.as_ref(),
        };
        let outcome = strategy.apply(ctx, &self.cache);

        if history.is_some() {
            if outcome.history_reused {
                bump(&self.stats.history_hits, 1);
            } else {
                bump(&self.stats.history_misses, 1);
            }
        }

        let point = match &self.provider.cache_ttl_hint {
            Some(ttl) => CachePoint::with_ttl(ttl.clone()),
            None => CachePoint::ephemeral(),
        };
        for position in outcome.breakpoints.iter() {
            request.set_cache_point_at(position, Some(point.clone()));
        }
        bump(&self.stats.breakpoints_placed, outcome.breakpoints.len() as u64);

        let record = ConversationCacheRecord::new(
            fingerprint.clone(),
            &segments,
            outcome.breakpoints.clone(),
        );
        let persisted = self.persist(&key, &record).await;

        info!(
            model = request.model(),
            %strategy,
            total_tokens,
            breakpoints = ?outcome.breakpoints.to_vec(),
            history_reused = outcome.history_reused,
            persisted,
            "Configured cache points"
        );

        Ok(CachePointOutcome {
            strategy,
            fingerprint,
            breakpoints: outcome.breakpoints.to_vec(),
            total_tokens,
            history_reused: outcome.history_reused,
            persisted,
        })
    }

    async fn load_record(&self, key: &str, fingerprint: &str) -> Option<ConversationCacheRecord> {
        match self.store.get(key).await {
            Ok(Some(record)) if record.fingerprint == fingerprint => Some(record),
            Ok(Some(_)) => {
                debug!(key, "Stored record belongs to another fingerprint");
                None
            }
            Ok(None) => None,
            Err(e) => {
                bump(&self.stats.store_errors, 1);
                warn!(key, error = %e, "Failed to read cache record, starting fresh");
                None
            }
        }
    }

    async fn persist(&self, key: &str, record: &ConversationCacheRecord) -> bool {
        match self.store.set(key, record, self.cache.cache_ttl_seconds).await {
            Ok(()) => true,
            Err(e) => {
                bump(&self.stats.store_errors, 1);
                warn!(key, error = %e, "Failed to persist cache record");
                false
            }
        }
    }
}
