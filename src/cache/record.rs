//! Persisted snapshot of the previous request's placement decision.

use serde::{Deserialize, Serialize};

use crate::cache::breakpoints::BreakpointSet;
use crate::cache::segment::{Segment, SegmentModel};

/// What a conversation looked like last time, and where breakpoints went.
///
/// Stored under its fingerprint and overwritten after every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationCacheRecord {
    pub fingerprint: String,

    #[serde(default)]
    pub segments: Vec<Segment>,

    #[serde(default)]
    pub breakpoints: BreakpointSet,
}

impl ConversationCacheRecord {
    pub fn new(fingerprint: impl Into<String>, model: &SegmentModel, breakpoints: BreakpointSet) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            segments: model.to_segments(),
            breakpoints,
        }
    }
}
