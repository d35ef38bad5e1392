//! Eviction policy: decides which breakpoints to drop when over budget.
//!
//! One slot is reserved for a fixed breakpoint (system, else tools) because
//! that prefix is the most stable and has the highest reuse value. The
//! remaining slots go to the most recent (highest position) breakpoints;
//! the oldest are evicted first.

use std::collections::BinaryHeap;

use crate::cache::breakpoints::BreakpointSet;

/// A breakpoint that may be evicted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    pub position: usize,
}

// Lower position = older breakpoint = evicted first.
impl PartialOrd for EvictionCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EvictionCandidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.position.cmp(&self.position)
    }
}

/// The eviction policy engine.
#[derive(Debug, Clone)]
pub struct Evictor {
    max_cache_points: usize,
}

impl Evictor {
    /// A budget of zero is treated as one.
    pub fn new(max_cache_points: usize) -> Self {
        Self {
            max_cache_points: max_cache_points.max(1),
        }
    }

    pub fn max_cache_points(&self) -> usize {
        self.max_cache_points
    }

    /// Breakpoints to drop so that at most `max_cache_points` remain.
    ///
    /// Returns positions ordered by eviction priority (oldest first). The
    /// protected fixed slot is never a victim.
    pub fn select_victims(&self, breakpoints: &BreakpointSet) -> Vec<EvictionCandidate> {
        if breakpoints.len() <= self.max_cache_points {
            return Vec::new();
        }

        let protected = breakpoints.fixed();
        let reserved = usize::from(protected.is_some());
        let keep = self.max_cache_points - reserved;

        let mut heap: BinaryHeap<EvictionCandidate> = breakpoints
            .iter()
            .filter(|p| Some(*p) != protected)
            .map(|position| EvictionCandidate { position })
            .collect();

        let count = heap.len().saturating_sub(keep);
        let mut victims = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(candidate) = heap.pop() {
                victims.push(candidate);
            } else {
                break;
            }
        }

        victims
    }

    /// Apply the policy, returning the surviving breakpoints.
    pub fn retain(&self, breakpoints: &BreakpointSet) -> BreakpointSet {
        let mut survivors = breakpoints.clone();
        for victim in self.select_victims(breakpoints) {
            survivors.remove(victim.position);
        }
        survivors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(positions: &[usize]) -> BreakpointSet {
        positions.iter().copied().collect()
    }

    #[test]
    fn test_under_budget_is_untouched() {
        let evictor = Evictor::new(4);
        let bps = set(&[1, 5, 9]);
        assert!(evictor.select_victims(&bps).is_empty());
        assert_eq!(evictor.retain(&bps), bps);
    }

    #[test]
    fn test_oldest_evicted_first() {
        let evictor = Evictor::new(2);
        let victims = evictor.select_victims(&set(&[3, 7, 5, 9]));
        let positions: Vec<usize> = victims.iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![3, 5]);
    }

    #[test]
    fn test_fixed_slot_reserved() {
        let evictor = Evictor::new(3);
        let survivors = evictor.retain(&set(&[1, 4, 6, 8, 10]));
        assert_eq!(survivors.to_vec(), vec![1, 8, 10]);
    }

    #[test]
    fn test_tools_slot_competes_when_system_slot_held() {
        let evictor = Evictor::new(2);
        let survivors = evictor.retain(&set(&[0, 1, 6]));
        assert_eq!(survivors.to_vec(), vec![1, 6]);
    }

    #[test]
    fn test_budget_of_one_keeps_fixed() {
        let evictor = Evictor::new(1);
        assert_eq!(evictor.retain(&set(&[0, 4, 5])).to_vec(), vec![0]);
        assert_eq!(evictor.retain(&set(&[4, 5])).to_vec(), vec![5]);
    }

    #[test]
    fn test_zero_budget_clamped() {
        assert_eq!(Evictor::new(0).max_cache_points(), 1);
    }
}
