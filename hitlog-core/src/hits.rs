use std::sync::atomic::{AtomicU8, Ordering};

/// Dense per-address execution counters for one module.
///
/// One byte per address offset in `[0, size)`. Counters saturate at 255
/// instead of wrapping. Recording is lock-free: callbacks from every thread
/// of the target hit the same slots through relaxed atomics, so an increment
/// racing another at the same address may be lost. That is an accepted
/// precision/performance trade-off; the table exists for coverage
/// visualization, not exact counts.
pub struct HitCounts {
    counts: Box<[AtomicU8]>,
}

impl HitCounts {
    /// Allocates a zeroed table with one counter per byte of module.
    ///
    /// Allocation is fallible so that an absurdly large module degrades to
    /// an uninstrumented run instead of aborting the target process.
    pub fn alloc(size: u64) -> Result<Self, TableAllocError> {
        let len = usize::try_from(size).map_err(|_| TableAllocError { size })?;
        let mut counts = Vec::new();
        counts
            .try_reserve_exact(len)
            .map_err(|_| TableAllocError { size })?;
        counts.resize_with(len, || AtomicU8::new(0));
        Ok(Self {
            counts: counts.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Records one execution at `index`.
    ///
    /// This is the hot path: one bounds check, one relaxed load and at most
    /// one relaxed store, no allocation. Out-of-range indices are no-ops.
    /// The stored value is always `old + 1` with `old < 255`, so the counter
    /// can never wrap even when increments race.
    #[inline]
    pub fn record(&self, index: u64) {
        let Some(slot) = usize::try_from(index)
            .ok()
            .and_then(|index| self.counts.get(index))
        else {
            return;
        };
        let count = slot.load(Ordering::Relaxed);
        if count < u8::MAX {
            slot.store(count + 1, Ordering::Relaxed);
        }
    }

    /// Current value of the counter at `index`.
    pub fn get(&self, index: usize) -> Option<u8> {
        self.counts.get(index).map(|slot| slot.load(Ordering::Relaxed))
    }

    /// Copies every counter out in ascending offset order.
    ///
    /// Only called at termination, after the host guarantees no further
    /// callbacks; never on the hot path.
    pub fn snapshot(&self) -> Vec<u8> {
        self.counts
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to allocate a {size} byte hit-count table")]
pub struct TableAllocError {
    size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_counters_saturate_at_255() {
        let hits = HitCounts::alloc(4).unwrap();
        for _ in 0..300 {
            hits.record(2);
        }
        assert_eq!(hits.get(2), Some(255));
        assert_eq!(hits.get(1), Some(0));
        assert_eq!(hits.get(3), Some(0));
    }

    #[test]
    fn ensure_out_of_range_records_are_noops() {
        let hits = HitCounts::alloc(4).unwrap();
        hits.record(4);
        hits.record(u64::MAX);
        assert_eq!(hits.snapshot(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn ensure_oversized_tables_fail_to_allocate() {
        assert!(HitCounts::alloc(u64::MAX).is_err());
    }

    #[test]
    fn ensure_empty_tables_are_valid() {
        let hits = HitCounts::alloc(0).unwrap();
        hits.record(0);
        assert!(hits.is_empty());
        assert!(hits.snapshot().is_empty());
    }

    #[test]
    fn ensure_concurrent_records_never_wrap() {
        let hits = HitCounts::alloc(8).unwrap();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100_000 {
                        hits.record(3);
                    }
                });
            }
        });
        // Racy increments may be lost, so the exact value after the threads
        // join is not guaranteed; a sequential top-up must saturate without
        // ever wrapping.
        assert!(hits.get(3).unwrap() > 0);
        for _ in 0..300 {
            hits.record(3);
        }
        assert_eq!(hits.get(3), Some(255));
        assert_eq!(hits.get(2), Some(0));
    }
}
