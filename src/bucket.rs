//! Mapping timestamps onto a fixed ring of buckets.
//!
//! Time is cut into `interval`-wide ticks and tick `n` lands in slot
//! `n mod bucket_count`. With `bucket_count = floor(period / interval) + 1` the ring
//! always has one slot more than the window needs: the slot right after the current
//! one is the next to be reused, so it is purged on every write and skipped on every
//! read.
//!
//! Invariants:
//! - `slot_for` always returns a value in `[0, bucket_count)`.
//! - `live_slots(s)` has `bucket_count - 1` distinct entries, starts at `s`, walks
//!   backwards, and never contains `next_slot(s)`.

use crate::config::CounterConfig;

/// Translates timestamps to slots and enumerates the live part of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketIndexer {
    interval_nanos: u64,
    bucket_count: usize,
}

impl BucketIndexer {
    /// Build an indexer for the given config.
    pub fn new(config: &CounterConfig) -> Self {
        Self { interval_nanos: config.interval_nanos(), bucket_count: config.bucket_count() }
    }

    /// Number of slots in the ring.
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Slot for a timestamp in nanoseconds since the epoch.
    pub fn slot_for(&self, timestamp_nanos: u64) -> usize {
        let tick = timestamp_nanos / self.interval_nanos;
        // bucket_count came from a usize, so the remainder fits back into one.
        (tick % self.bucket_count as u64) as usize
    }

    /// Slot that the next tick will reuse; purged on every increment.
    pub fn next_slot(&self, current_slot: usize) -> usize {
        (current_slot + 1) % self.bucket_count
    }

    /// Slots making up the window ending at `current_slot`, most recent first.
    pub fn live_slots(&self, current_slot: usize) -> Vec<usize> {
        (0..self.bucket_count - 1).map(|i| self.slot_back(current_slot, i)).collect()
    }

    /// Slot `ticks` steps before `current_slot`, wrapping around the ring.
    fn slot_back(&self, current_slot: usize, ticks: usize) -> usize {
        let ticks = ticks % self.bucket_count;
        if ticks <= current_slot {
            current_slot - ticks
        } else {
            self.bucket_count - (ticks - current_slot)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    const SEC: u64 = 1_000_000_000;

    fn indexer(period_secs: u64, interval_secs: u64) -> BucketIndexer {
        let cfg = CounterConfig::new(
            "t",
            Duration::from_secs(period_secs),
            Duration::from_secs(interval_secs),
        )
        .unwrap();
        BucketIndexer::new(&cfg)
    }

    #[test]
    fn slot_for_wraps_modulo_bucket_count() {
        let idx = indexer(3, 1);
        assert_eq!(idx.bucket_count(), 4);
        assert_eq!(idx.slot_for(0), 0);
        assert_eq!(idx.slot_for(SEC - 1), 0);
        assert_eq!(idx.slot_for(SEC), 1);
        assert_eq!(idx.slot_for(3 * SEC + 5), 3);
        assert_eq!(idx.slot_for(4 * SEC), 0);
        assert!(idx.slot_for(u64::MAX) < 4);
    }

    #[test]
    fn live_slots_walk_backwards_from_current() {
        let idx = indexer(3, 1);
        assert_eq!(idx.live_slots(0), vec![0, 3, 2]);
        assert_eq!(idx.live_slots(2), vec![2, 1, 0]);
        assert_eq!(idx.live_slots(3), vec![3, 2, 1]);
    }

    #[test]
    fn live_slots_are_distinct_and_exclude_next() {
        for (period, interval) in [(1, 1), (2, 1), (3, 1), (60, 1), (60, 7), (600, 60)] {
            let idx = indexer(period, interval);
            let n = idx.bucket_count();
            assert_eq!(n, (period / interval) as usize + 1);
            for current in 0..n {
                let live = idx.live_slots(current);
                assert_eq!(live.len(), n - 1);
                assert_eq!(live[0], current);
                let distinct: HashSet<_> = live.iter().copied().collect();
                assert_eq!(distinct.len(), n - 1);
                assert!(!distinct.contains(&idx.next_slot(current)));
            }
        }
    }

    #[test]
    fn slot_back_does_not_overflow_on_huge_rings() {
        let idx = BucketIndexer { interval_nanos: 1, bucket_count: usize::MAX };
        assert_eq!(idx.slot_back(usize::MAX - 1, 0), usize::MAX - 1);
        assert_eq!(idx.slot_back(usize::MAX - 1, 1), usize::MAX - 2);
        assert_eq!(idx.slot_back(0, 1), usize::MAX - 1);
        assert_eq!(idx.slot_back(3, usize::MAX - 2), 5);
    }

    #[test]
    fn next_slot_wraps() {
        let idx = indexer(3, 1);
        assert_eq!(idx.next_slot(2), 3);
        assert_eq!(idx.next_slot(3), 0);
    }
}
