//! Breakpoint tracker: the per-request working set of cache breakpoints.
//!
//! The tracker is built fresh for every request from the current segment
//! model. It:
//! - Reuses breakpoints from the previous request when the prefix still matches
//! - Assigns a single fixed-slot breakpoint covering tools and system
//! - Adds a trailing breakpoint once enough uncached content has accumulated
//! - Enforces the breakpoint budget through the [`Evictor`]

use tracing::debug;

use crate::cache::breakpoints::BreakpointSet;
use crate::cache::evictor::Evictor;
use crate::cache::record::ConversationCacheRecord;
use crate::cache::segment::{SegmentModel, SYSTEM_POSITION, TOOLS_POSITION};

#[derive(Debug, Clone)]
pub struct BreakpointTracker {
    model: SegmentModel,
    breakpoints: BreakpointSet,
}

impl BreakpointTracker {
    pub fn new(model: SegmentModel) -> Self {
        Self {
            model,
            breakpoints: BreakpointSet::new(),
        }
    }

    pub fn model(&self) -> &SegmentModel {
        &self.model
    }

    pub fn breakpoints(&self) -> &BreakpointSet {
        &self.breakpoints
    }

    pub fn into_breakpoints(self) -> BreakpointSet {
        self.breakpoints
    }

    /// Mark `position` as a breakpoint. Unknown positions are refused.
    pub fn add_breakpoint(&mut self, position: usize) -> bool {
        if self.model.get(position).is_none() {
            return false;
        }
        self.breakpoints.insert(position)
    }

    /// Copy the previous request's breakpoints if its prefix is unchanged.
    ///
    /// Every recorded segment must exist at the same position with the same
    /// hash; a position the current model lacks counts as a mismatch.
    /// Returns whether history was reused.
    pub fn load_history(&mut self, record: &ConversationCacheRecord) -> bool {
        for old in &record.segments {
            match self.model.get(old.position) {
                Some(current) if current.content_hash == old.content_hash => {}
                Some(_) => {
                    debug!(position = old.position, "History hash mismatch");
                    return false;
                }
                None => {
                    debug!(
                        position = old.position,
                        segments = self.model.len(),
                        "History position out of range"
                    );
                    return false;
                }
            }
        }

        let mut restored = record.breakpoints.clone();
        restored.retain_valid(&self.model);
        for position in restored.iter() {
            self.breakpoints.insert(position);
        }

        debug!(restored = restored.len(), "Reused history breakpoints");
        true
    }

    /// Place one breakpoint over tools and system when they are worth caching.
    ///
    /// With both present, the system slot caches both as a single prefix.
    pub fn assign_fixed_slot(&mut self, min_cache_tokens: usize) -> Option<usize> {
        if self.breakpoints.has_fixed() {
            return None;
        }

        let tools = self.model.tools_tokens();
        let system = self.model.system_tokens();
        if tools + system < min_cache_tokens {
            return None;
        }

        let position = match (tools > 0, system > 0) {
            (_, true) => SYSTEM_POSITION,
            (true, false) => TOOLS_POSITION,
            (false, false) => return None,
        };

        self.breakpoints.insert(position);
        debug!(position, tools, system, "Assigned fixed-slot breakpoint");
        Some(position)
    }

    /// Tokens after the highest breakpoint through the last message.
    pub fn uncached_tokens(&self) -> usize {
        let after = self.breakpoints.highest();
        self.model
            .iter()
            .filter(|s| after.map_or(true, |h| s.position > h))
            .map(|s| s.token_estimate)
            .sum()
    }

    /// Add a breakpoint on the last message once enough uncached tokens exist.
    pub fn grow(&mut self, refresh_point_min_tokens: usize) -> Option<usize> {
        let last = self.model.last_message_position()?;
        let uncached = self.uncached_tokens();
        if uncached < refresh_point_min_tokens {
            debug!(uncached, threshold = refresh_point_min_tokens, "Deferring trailing breakpoint");
            return None;
        }

        self.breakpoints.insert(last);
        debug!(position = last, uncached, "Added trailing breakpoint");
        Some(last)
    }

    /// Evict down to `max_cache_points`, returning how many were dropped.
    pub fn reset_point_index(&mut self, max_cache_points: usize) -> usize {
        let before = self.breakpoints.len();
        self.breakpoints = Evictor::new(max_cache_points).retain(&self.breakpoints);
        let evicted = before - self.breakpoints.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.breakpoints.len(), "Evicted breakpoints");
        }
        evicted
    }
}
