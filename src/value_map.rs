// Public API for the value variant: identity is (key_a, key_b). See
// spec.md §1/§6.

use std::sync::Arc;

use crate::config::LocMapOptions;
use crate::entry::Location;
use crate::error::Result;
use crate::identity::ValueKey;
use crate::node::EngineConfig;
use crate::reorg::ReorgPool;
use crate::root::RootArray;
use crate::scan::{scan, ScanOutcome, ScanRequest};
use crate::stats::{gather, Stats};

/// Concurrent map from `(key_a, key_b)` to a `(timestamp, block_id, offset,
/// length)` location tuple.
pub struct ValueLocMap {
    roots: RootArray<ValueKey>,
    pool: Arc<ReorgPool<ValueKey>>,
    inactive_mask: std::sync::atomic::AtomicU64,
}

impl ValueLocMap {
    pub fn new(options: LocMapOptions) -> Result<Self> {
        let cfg = Arc::new(EngineConfig {
            page_size: options.page_size(),
            split_level: options.split_level(),
            merge_level: (options.split_level() / 4).max(1),
        });
        let roots = RootArray::new(options.roots(), cfg);
        let pool = Arc::new(ReorgPool::new(options.workers())?);
        tracing::debug!(roots = options.roots(), page_size = options.page_size(), "ValueLocMap constructed");
        Ok(Self { roots, pool, inactive_mask: std::sync::atomic::AtomicU64::new(options.inactive_mask()) })
    }

    /// Reconcile `(timestamp, block_id, offset, length)` against whatever is
    /// already stored for `(key_a, key_b)`. Returns the prior timestamp.
    /// `block_id == 0` writes a tombstone. See spec.md §4.1.
    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &self,
        key_a: u64,
        key_b: u64,
        timestamp: u64,
        block_id: u32,
        offset: u32,
        length: u32,
        even_if_same_timestamp: bool,
    ) -> u64 {
        let id = ValueKey { key_a, key_b };
        let root_index = self.roots.index_of(key_a);
        let handle = self.pool.handle_for(root_index);
        self.roots.set(id, timestamp, block_id, offset, length, even_if_same_timestamp, &handle)
    }

    pub fn get(&self, key_a: u64, key_b: u64) -> Location {
        self.roots.get(ValueKey { key_a, key_b })
    }

    /// Clear every live entry with `key_a` in `[low_key_a, high_key_a]`
    /// whose timestamp overlaps `mask`. See spec.md §4.6.
    pub fn discard(&self, low_key_a: u64, high_key_a: u64, mask: u64) {
        self.roots.discard(low_key_a, high_key_a, mask);
    }

    /// Visit every live entry matching `request`, in ascending `key_a`
    /// order within each root. Unlike the group variant's callback, this one
    /// has no way to signal early termination — see spec.md §4.1.
    pub fn scan_callback(&self, request: &ScanRequest, mut callback: impl FnMut(u64, u64, Location)) -> ScanOutcome {
        scan(&self.roots, request, |entry| {
            callback(entry.key_a, entry.key_b, entry.location);
            true
        })
    }

    pub fn set_inactive_mask(&self, mask: u64) {
        self.inactive_mask.store(mask, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn gather_stats(&self, debug: bool) -> Stats {
        let mask = self.inactive_mask.load(std::sync::atomic::Ordering::Relaxed);
        gather(&self.roots, mask, debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_map() -> ValueLocMap {
        ValueLocMap::new(
            LocMapOptions::builder().roots(1).page_size(1).split_multiplier(1000).workers(1).build(),
        )
        .unwrap()
    }

    #[test]
    fn new_key_then_overwrite() {
        let m = small_map();
        assert_eq!(m.set(1, 1, 10, 1, 0, 5, false), 0);
        assert_eq!(m.get(1, 1).as_tuple(), (10, 1, 0, 5));
        assert_eq!(m.set(1, 1, 20, 2, 0, 6, false), 10);
        assert_eq!(m.get(1, 1).as_tuple(), (20, 2, 0, 6));
    }

    #[test]
    fn older_set_is_ignored() {
        let m = small_map();
        m.set(1, 1, 20, 2, 0, 6, false);
        let old = m.set(1, 1, 10, 9, 0, 9, false);
        assert_eq!(old, 20);
        assert_eq!(m.get(1, 1).as_tuple(), (20, 2, 0, 6));
    }

    #[test]
    fn discard_clears_matching_range() {
        let m = small_map();
        m.set(1, 1, 5, 1, 0, 1, false);
        m.set(100, 1, 5, 1, 0, 1, false);
        m.discard(0, 50, u64::MAX);
        assert_eq!(m.get(1, 1).as_tuple(), (0, 0, 0, 0));
        assert_eq!(m.get(100, 1).as_tuple(), (5, 1, 0, 1));
    }

    #[test]
    fn scan_callback_visits_every_live_entry() {
        let m = small_map();
        for i in 0..20u64 {
            m.set(i, i, 1, 1, 0, 1, false);
        }
        let mut seen = Vec::new();
        let outcome = m.scan_callback(&ScanRequest::default(), |a, _b, _loc| seen.push(a));
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
        assert!(!outcome.more);
    }

    #[test]
    fn overflow_and_split_still_preserve_every_entry() {
        let m = ValueLocMap::new(
            LocMapOptions::builder().roots(1).page_size(4).split_multiplier(2).workers(1).build(),
        )
        .unwrap();
        for i in 0..500u64 {
            m.set(0, i, 1, 1, 0, 1, false);
        }
        for i in 0..500u64 {
            assert_eq!(m.get(0, i).as_tuple(), (1, 1, 0, 1));
        }
    }

    #[test]
    fn stats_report_gathered_bytes() {
        let m = small_map();
        m.set(1, 1, 5, 1, 0, 10, false);
        m.set(1, 2, 5, 1, 0, 20, false);
        let stats = m.gather_stats(false);
        assert_eq!(stats.active_count, 2);
        assert_eq!(stats.active_bytes, 30);
    }
}
