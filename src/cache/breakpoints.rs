//! The set of segment positions marked as cache boundaries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::cache::segment::{SegmentModel, SYSTEM_POSITION, TOOLS_POSITION};

/// Ordered, duplicate-free set of breakpoint positions.
///
/// Iteration is ascending, so a fixed slot (0 or 1) always comes first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakpointSet {
    positions: BTreeSet<usize>,
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a breakpoint. Returns `false` if it was already present.
    pub fn insert(&mut self, position: usize) -> bool {
        self.positions.insert(position)
    }

    pub fn remove(&mut self, position: usize) -> bool {
        self.positions.remove(&position)
    }

    pub fn contains(&self, position: usize) -> bool {
        self.positions.contains(&position)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions.iter().copied()
    }

    pub fn highest(&self) -> Option<usize> {
        self.positions.last().copied()
    }

    /// The fixed-slot breakpoint worth keeping: the system slot if set,
    /// otherwise the tools slot.
    pub fn fixed(&self) -> Option<usize> {
        [SYSTEM_POSITION, TOOLS_POSITION]
            .into_iter()
            .find(|p| self.contains(*p))
    }

    pub fn has_fixed(&self) -> bool {
        self.fixed().is_some()
    }

    /// Drop positions that do not exist in `model`.
    pub fn retain_valid(&mut self, model: &SegmentModel) {
        self.positions.retain(|p| model.get(*p).is_some());
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

impl FromIterator<usize> for BreakpointSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().collect(),
        }
    }
}
