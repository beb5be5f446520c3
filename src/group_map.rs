// Public API for the group variant: identity is (group_key_a, group_key_b,
// name_hash), plus GetGroup to enumerate a whole group. See spec.md §1/§6.

use std::sync::Arc;

use crate::config::LocMapOptions;
use crate::entry::{Entry, Location};
use crate::error::Result;
use crate::identity::GroupKey;
use crate::node::EngineConfig;
use crate::reorg::ReorgPool;
use crate::root::RootArray;
use crate::scan::{scan, ScanOutcome, ScanRequest};
use crate::stats::{gather, Stats};

/// Concurrent map from `(group_key_a, group_key_b, name_hash)` to a
/// `(timestamp, block_id, offset, length)` location tuple, with an
/// additional `get_group` to enumerate every member of a group.
pub struct GroupLocMap {
    roots: RootArray<GroupKey>,
    pool: Arc<ReorgPool<GroupKey>>,
    inactive_mask: std::sync::atomic::AtomicU64,
}

impl GroupLocMap {
    pub fn new(options: LocMapOptions) -> Result<Self> {
        let cfg = Arc::new(EngineConfig {
            page_size: options.page_size(),
            split_level: options.split_level(),
            merge_level: (options.split_level() / 4).max(1),
        });
        let roots = RootArray::new(options.roots(), cfg);
        let pool = Arc::new(ReorgPool::new(options.workers())?);
        tracing::debug!(roots = options.roots(), page_size = options.page_size(), "GroupLocMap constructed");
        Ok(Self { roots, pool, inactive_mask: std::sync::atomic::AtomicU64::new(options.inactive_mask()) })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &self,
        group_key_a: u64,
        group_key_b: u64,
        name_hash: u64,
        timestamp: u64,
        block_id: u32,
        offset: u32,
        length: u32,
        even_if_same_timestamp: bool,
    ) -> u64 {
        let id = GroupKey { group_key_a, group_key_b, name_hash };
        let root_index = self.roots.index_of(group_key_a);
        let handle = self.pool.handle_for(root_index);
        self.roots.set(id, timestamp, block_id, offset, length, even_if_same_timestamp, &handle)
    }

    pub fn get(&self, group_key_a: u64, group_key_b: u64, name_hash: u64) -> Location {
        self.roots.get(GroupKey { group_key_a, group_key_b, name_hash })
    }

    /// Every live `(name_hash, location)` pair stored under one group.
    /// Below routing depth 64 the whole group shares one trie path, so this
    /// is a single descent; past depth 64 (unreachable at realistic group
    /// sizes) both children are searched. See spec.md §4.2/§4.7.
    pub fn get_group(&self, group_key_a: u64, group_key_b: u64) -> Vec<Entry> {
        self.roots.collect_group(group_key_a, group_key_b)
    }

    pub fn discard(&self, low_key_a: u64, high_key_a: u64, mask: u64) {
        self.roots.discard(low_key_a, high_key_a, mask);
    }

    /// Visit every live entry matching `request`, in ascending `key_a` order
    /// within each root. Unlike the value variant, `callback` returns a
    /// `bool` signaling whether to keep scanning — see spec.md §4.1.
    pub fn scan_callback(
        &self,
        request: &ScanRequest,
        mut callback: impl FnMut(u64, u64, u64, Location) -> bool,
    ) -> ScanOutcome {
        scan(&self.roots, request, |entry| {
            callback(entry.key_a, entry.key_b, entry.name_hash, entry.location)
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
