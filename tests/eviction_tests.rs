//! Integration tests for the eviction policy.

use prompt_cache_points::cache::breakpoints::BreakpointSet;
use prompt_cache_points::cache::evictor::Evictor;
use prompt_cache_points::cache::segment::{Segment, SegmentModel};
use prompt_cache_points::cache::tracker::BreakpointTracker;

fn make_model(system: bool, message_count: usize) -> SegmentModel {
    SegmentModel {
        tools: Segment::new(0, "tools", 100),
        system: system.then(|| Segment::new(1, "system", 100)),
        messages: (0..message_count)
            .map(|i| Segment::new(i + 2, format!("message-{i}"), 100))
            .collect(),
    }
}

#[test]
fn test_any_add_sequence_respects_budget() {
    for max in 1..=5 {
        let mut tracker = BreakpointTracker::new(make_model(true, 12));
        // Deliberately unordered, with duplicates and invalid positions.
        for position in [7, 1, 3, 13, 0, 9, 3, 11, 40, 2, 5] {
            tracker.add_breakpoint(position);
        }
        tracker.reset_point_index(max);
        assert!(
            tracker.breakpoints().len() <= max,
            "budget {max} exceeded: {:?}",
            tracker.breakpoints().to_vec()
        );
    }
}

#[test]
fn test_fixed_slot_kept_oldest_dropped() {
    let evictor = Evictor::new(4);
    let breakpoints: BreakpointSet = [1, 3, 5, 7, 9, 11].into_iter().collect();

    let survivors = evictor.retain(&breakpoints);
    assert_eq!(survivors.to_vec(), vec![1, 7, 9, 11]);

    let victims: Vec<usize> = evictor
        .select_victims(&breakpoints)
        .iter()
        .map(|v| v.position)
        .collect();
    assert_eq!(victims, vec![3, 5]);
}

#[test]
fn test_tools_slot_reserved_without_system() {
    let mut tracker = BreakpointTracker::new(make_model(false, 6));
    for position in [0, 2, 3, 4, 5, 6, 7] {
        assert!(tracker.add_breakpoint(position));
    }

    assert_eq!(tracker.reset_point_index(3), 4);
    assert_eq!(tracker.breakpoints().to_vec(), vec![0, 6, 7]);
}

#[test]
fn test_without_fixed_slot_most_recent_win() {
    let evictor = Evictor::new(2);
    let breakpoints: BreakpointSet = [4, 2, 8, 6].into_iter().collect();
    assert_eq!(evictor.retain(&breakpoints).to_vec(), vec![6, 8]);
}

#[test]
fn test_empty_set_evicts_nothing() {
    let evictor = Evictor::new(4);
    assert!(evictor.select_victims(&BreakpointSet::new()).is_empty());
}
