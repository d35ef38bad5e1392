//! Placement strategies.
//!
//! Which strategy runs is a pure function of the request's total token
//! estimate and the provider's capabilities:
//! - [`Strategy::None`]: too small to cache, no breakpoints
//! - [`Strategy::Dynamic`]: multi-breakpoint placement driven by history
//! - [`Strategy::Auto`]: one breakpoint on the last message
//! - [`Strategy::Manual`]: keep the caller's last valid marker

use serde::Serialize;
use tracing::debug;

use crate::cache::breakpoints::BreakpointSet;
use crate::cache::record::ConversationCacheRecord;
use crate::cache::segment::SegmentModel;
use crate::cache::tracker::BreakpointTracker;
use crate::config::{CacheConfig, Placement, ProviderConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    None,
    Manual,
    Dynamic,
    Auto,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::None => write!(f, "none"),
            Strategy::Manual => write!(f, "manual"),
            Strategy::Dynamic => write!(f, "dynamic"),
            Strategy::Auto => write!(f, "auto"),
        }
    }
}

/// Everything a strategy looks at.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    pub segments: &'a SegmentModel,

    /// Whether the provider caches for this model.
    pub cacheable: bool,

    /// Positions the caller marked before markers were reset.
    pub requested: &'a [usize],

    /// Record left by the previous request with the same fingerprint.
    pub history: Option<&'a ConversationCacheRecord>,
}

/// Result of running a strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementOutcome {
    pub breakpoints: BreakpointSet,
    pub history_reused: bool,
}

impl Strategy {
    pub fn select(
        total_tokens: usize,
        model: &str,
        cache: &CacheConfig,
        provider: &ProviderConfig,
    ) -> Strategy {
        if total_tokens < cache.min_cache_tokens {
            return Strategy::None;
        }
        match provider.placement {
            Placement::Dynamic if provider.supports_caching(model) => Strategy::Dynamic,
            Placement::Dynamic => Strategy::None,
            Placement::Auto => Strategy::Auto,
            Placement::Manual => Strategy::Manual,
        }
    }

    pub fn apply(&self, ctx: StrategyContext<'_>, cache: &CacheConfig) -> PlacementOutcome {
        match self {
            Strategy::None => PlacementOutcome::default(),
            Strategy::Dynamic => apply_dynamic(ctx, cache),
            Strategy::Auto => apply_auto(ctx, cache),
            Strategy::Manual => apply_manual(ctx, cache),
        }
    }
}

/// History load, fixed slot, incremental growth, eviction.
fn apply_dynamic(ctx: StrategyContext<'_>, cache: &CacheConfig) -> PlacementOutcome {
    let mut tracker = BreakpointTracker::new(ctx.segments.clone());

    let history_reused = match ctx.history {
        Some(record) => tracker.load_history(record),
        None => false,
    };
    tracker.assign_fixed_slot(cache.min_cache_tokens);
    tracker.grow(cache.refresh_point_min_tokens);
    tracker.reset_point_index(cache.max_cache_points);

    PlacementOutcome {
        breakpoints: tracker.into_breakpoints(),
        history_reused,
    }
}

fn apply_auto(ctx: StrategyContext<'_>, cache: &CacheConfig) -> PlacementOutcome {
    let mut breakpoints = BreakpointSet::new();
    if ctx.cacheable && ctx.segments.total_tokens() >= cache.min_cache_tokens {
        if let Some(last) = ctx.segments.last_message_position() {
            breakpoints.insert(last);
        }
    }
    PlacementOutcome {
        breakpoints,
        history_reused: false,
    }
}

/// Providers of this family accept a single breakpoint, so only the last
/// valid marker survives.
fn apply_manual(ctx: StrategyContext<'_>, cache: &CacheConfig) -> PlacementOutcome {
    let mut breakpoints = BreakpointSet::new();
    if ctx.cacheable {
        let last_valid = ctx.requested.iter().copied().rev().find(|p| {
            ctx.segments
                .get(*p)
                .is_some_and(|s| s.token_estimate >= cache.min_cache_tokens)
        });
        if let Some(position) = last_valid {
            breakpoints.insert(position);
        }
        debug!(
            requested = ctx.requested.len(),
            kept = ?last_valid,
            "Filtered manual breakpoints"
        );
    }
    PlacementOutcome {
        breakpoints,
        history_reused: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::segment::Segment;

    fn segments(tools: usize, system: Option<usize>, messages: &[usize]) -> SegmentModel {
        SegmentModel {
            tools: Segment::new(0, "t", tools),
            system: system.map(|t| Segment::new(1, "s", t)),
            messages: messages
                .iter()
                .enumerate()
                .map(|(i, t)| Segment::new(i + 2, format!("m{i}"), *t))
                .collect(),
        }
    }

    fn ctx<'a>(segments: &'a SegmentModel, requested: &'a [usize]) -> StrategyContext<'a> {
        StrategyContext {
            segments,
            cacheable: true,
            requested,
            history: None,
        }
    }

    #[test]
    fn test_select_below_threshold_is_none() {
        let cache = CacheConfig::default();
        for placement in [Placement::Dynamic, Placement::Auto, Placement::Manual] {
            let provider = ProviderConfig {
                placement,
                ..Default::default()
            };
            assert_eq!(Strategy::select(2047, "m", &cache, &provider), Strategy::None);
        }
    }

    #[test]
    fn test_select_by_placement() {
        let cache = CacheConfig::default();
        let mut provider = ProviderConfig::default();
        assert_eq!(Strategy::select(2048, "m", &cache, &provider), Strategy::Dynamic);

        provider.placement = Placement::Auto;
        assert_eq!(Strategy::select(2048, "m", &cache, &provider), Strategy::Auto);

        provider.placement = Placement::Dynamic;
        provider.cacheable_models = vec!["claude".to_string()];
        assert_eq!(Strategy::select(9000, "titan", &cache, &provider), Strategy::None);
    }

    #[test]
    fn test_dynamic_scenario_trailing_breakpoint_only() {
        let model = segments(0, Some(1000), &[800, 1200, 3200]);
        let outcome = Strategy::Dynamic.apply(ctx(&model, &[]), &CacheConfig::default());
        assert_eq!(outcome.breakpoints.to_vec(), vec![4]);
        assert!(!outcome.history_reused);
    }

    #[test]
    fn test_auto_marks_last_message() {
        let model = segments(2000, Some(500), &[10, 20]);
        let outcome = Strategy::Auto.apply(ctx(&model, &[1, 2]), &CacheConfig::default());
        assert_eq!(outcome.breakpoints.to_vec(), vec![3]);
    }

    #[test]
    fn test_auto_unsupported_model_is_noop() {
        let model = segments(5000, None, &[10]);
        let mut context = ctx(&model, &[]);
        context.cacheable = false;
        let outcome = Strategy::Auto.apply(context, &CacheConfig::default());
        assert!(outcome.breakpoints.is_empty());
    }

    #[test]
    fn test_manual_keeps_last_valid_marker() {
        let cache = CacheConfig {
            min_cache_tokens: 1000,
            ..Default::default()
        };
        // Marker on 2 is too small; 3 and 4 are valid.
        let model = segments(0, None, &[10, 1500, 2500, 10]);
        let outcome = Strategy::Manual.apply(ctx(&model, &[2, 3, 4]), &cache);
        assert_eq!(outcome.breakpoints.to_vec(), vec![4]);
    }

    #[test]
    fn test_manual_skips_trailing_invalid_marker() {
        let cache = CacheConfig {
            min_cache_tokens: 1000,
            ..Default::default()
        };
        let model = segments(0, None, &[1500, 10]);
        let outcome = Strategy::Manual.apply(ctx(&model, &[2, 3]), &cache);
        assert_eq!(outcome.breakpoints.to_vec(), vec![2]);
    }
}
