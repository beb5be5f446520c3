// GatherStats / Stats. See spec.md §4.6 "GatherStats" and §6 (the `debug`
// rendering mode). Active vs inactive is judged against a configurable
// mask applied to the timestamp, mirroring
// examples/original_source/valuelocmap_test.go's TestStatsBasic, which sets
// an inactive mask and checks the resulting active/inactive split.

use std::fmt;

use crate::entry::Entry;
use crate::identity::Identity;
use crate::root::RootArray;

/// Snapshot produced by `gather_stats`. Counts are weakly consistent: taken
/// while Sets/Discards may be running concurrently elsewhere in the trie
/// (spec.md §5).
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub roots: usize,
    pub active_count: u64,
    pub active_bytes: u64,
    pub inactive_count: u64,
    pub inactive_bytes: u64,
    pub tombstone_count: u64,
    debug: bool,
    per_root_counts: Vec<u64>,
}

impl Stats {
    /// Per-root active entry counts, present only when gathered with
    /// `debug == true`.
    pub fn per_root_counts(&self) -> Option<&[u64]> {
        self.debug.then_some(&self.per_root_counts[..])
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.debug {
            writeln!(f, "roots: {}", self.roots)?;
        }
        writeln!(f, "activeCount: {}", self.active_count)?;
        writeln!(f, "activeBytes: {}", self.active_bytes)?;
        writeln!(f, "inactiveCount: {}", self.inactive_count)?;
        writeln!(f, "inactiveBytes: {}", self.inactive_bytes)?;
        write!(f, "tombstoneCount: {}", self.tombstone_count)?;
        if let Some(counts) = self.per_root_counts() {
            for (idx, count) in counts.iter().enumerate() {
                write!(f, "\n  roots[{idx}]: {count}")?;
            }
        }
        Ok(())
    }
}

pub(crate) fn gather<I: Identity + Send + Sync + 'static>(
    roots: &RootArray<I>,
    inactive_mask: u64,
    debug: bool,
) -> Stats {
    let mut stats = Stats { roots: roots.len(), debug, ..Default::default() };
    if debug {
        stats.per_root_counts = vec![0; roots.len()];
    }

    for idx in 0..roots.len() {
        let mut root_active: u64 = 0;
        roots.root(idx).for_each_entry(&mut |entry: &Entry| {
            tally(&mut stats, entry, inactive_mask);
            if entry.location.is_live() {
                root_active += 1;
            }
            true
        });
        if debug {
            stats.per_root_counts[idx] = root_active;
        }
    }
    stats
}

fn tally(stats: &mut Stats, entry: &Entry, inactive_mask: u64) {
    if entry.location.is_tombstone() {
        stats.tombstone_count += 1;
        return;
    }
    if !entry.location.is_live() {
        return;
    }
    let bytes = entry.location.length as u64;
    if inactive_mask != 0 && (entry.location.timestamp & inactive_mask) != 0 {
        stats.inactive_count += 1;
        stats.inactive_bytes += bytes;
    } else {
        stats.active_count += 1;
        stats.active_bytes += bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ValueKey;
    use crate::node::EngineConfig;
    use crate::reorg::ReorgPool;
    use std::sync::Arc;

    #[test]
    fn basic_stats_separate_active_from_inactive() {
        let cfg = Arc::new(EngineConfig { page_size: 16, split_level: usize::MAX, merge_level: 0 });
        let roots: RootArray<ValueKey> = RootArray::new(1, cfg);
        let pool = Arc::new(ReorgPool::new(1).unwrap());
        let handle = pool.handle_for(0);
        roots.set(ValueKey { key_a: 0, key_b: 0 }, 0b01, 1, 0, 10, false, &handle);
        roots.set(ValueKey { key_a: 0, key_b: 1 }, 0b10, 1, 0, 20, false, &handle);
        roots.set(ValueKey { key_a: 0, key_b: 2 }, 0b11, 0, 0, 0, false, &handle);

        let stats = gather(&roots, 0b01, false);
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.active_bytes, 20);
        assert_eq!(stats.inactive_count, 1);
        assert_eq!(stats.inactive_bytes, 10);
        assert_eq!(stats.tombstone_count, 1);
    }

    #[test]
    fn display_mentions_roots_only_in_debug_mode() {
        let cfg = Arc::new(EngineConfig { page_size: 16, split_level: usize::MAX, merge_level: 0 });
        let roots: RootArray<ValueKey> = RootArray::new(1, cfg);

        let debug_stats = gather(&roots, 0, true);
        assert!(debug_stats.to_string().contains("roots"));

        let plain_stats = gather(&roots, 0, false);
        assert!(!plain_stats.to_string().contains("roots"));
    }
}
