//! Prompt cache breakpoint placement.
//!
//! This module contains the core data structures and algorithms:
//! - [`segment`]: Segment, SegmentModel, content hashing and fingerprints
//! - [`breakpoints`]: the ordered breakpoint set
//! - [`record`]: the persisted per-conversation snapshot
//! - [`tracker`]: history reuse, fixed-slot assignment and incremental growth
//! - [`evictor`]: budget enforcement (fixed slot + most recent)
//! - [`strategy`]: None / Manual / Dynamic / Auto dispatch
//! - [`manager`]: per-request orchestration

pub mod breakpoints;
pub mod evictor;
pub mod manager;
pub mod record;
pub mod segment;
pub mod strategy;
pub mod tracker;
