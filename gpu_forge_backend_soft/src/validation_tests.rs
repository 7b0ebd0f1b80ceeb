//! Unit tests for the validation tracker

use super::*;

#[test]
fn test_counters_accumulate() {
    let tracker = ValidationTracker::new(true);
    tracker.partial_copy(16, 64);
    tracker.partial_copy(32, 64);
    tracker.dispatch_without_writes("ReadInput");
    tracker.unused_write_map();

    let stats = tracker.stats();
    assert_eq!(stats.partial_copies, 2);
    assert_eq!(stats.dispatches_without_writes, 1);
    assert_eq!(stats.unused_write_maps, 1);
    assert_eq!(stats.total(), 4);
}

#[test]
fn test_disabled_tracker_counts_nothing() {
    let tracker = ValidationTracker::new(false);
    tracker.partial_copy(16, 64);
    tracker.unused_write_map();
    assert_eq!(tracker.stats(), ValidationStats::default());
}

#[test]
fn test_reset() {
    let tracker = ValidationTracker::new(true);
    tracker.dispatch_without_writes("ReadInput");
    tracker.reset();
    assert_eq!(tracker.stats().total(), 0);
}
