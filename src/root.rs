// The top-level shard array. See spec.md §3 ("Root array") and §4.2: a root
// is chosen by the high bits of key_a (never by route_words, which only
// decides descent *within* a root), so every root owns a contiguous key_a
// range and Scan/Discard can prune whole roots by range before falling back
// to the per-entry filters that the trie below a root can't avoid.

use std::sync::Arc;

use crate::entry::Entry;
use crate::identity::Identity;
use crate::node::{EngineConfig, Node, ReorgSink};

/// `[lo, hi]` inclusive key_a bounds owned by one root.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RootSpan {
    pub lo: u64,
    pub hi: u64,
}

pub(crate) struct RootArray<I: Identity + Send + Sync + 'static> {
    roots: Vec<Arc<Node<I>>>,
    spans: Vec<RootSpan>,
}

impl<I: Identity + Send + Sync + 'static> RootArray<I> {
    pub fn new(count: usize, cfg: Arc<EngineConfig>) -> Self {
        debug_assert!(count.is_power_of_two());
        let roots = (0..count).map(|_| Node::new_leaf(0, cfg.clone())).collect();
        let spans = (0..count).map(|i| span_of(i, count)).collect();
        Self { roots, spans }
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn index_of(&self, key_a: u64) -> usize {
        if self.roots.len() == 1 {
            return 0;
        }
        let shift = 64 - self.roots.len().trailing_zeros();
        (key_a >> shift) as usize
    }

    pub fn root(&self, index: usize) -> &Arc<Node<I>> {
        &self.roots[index]
    }

    pub fn span(&self, index: usize) -> RootSpan {
        self.spans[index]
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &self,
        id: I,
        timestamp: u64,
        block_id: u32,
        offset: u32,
        length: u32,
        even_if_same_timestamp: bool,
        reorg: &dyn ReorgSink<I>,
    ) -> u64 {
        let idx = self.index_of(id.key_a());
        self.roots[idx].set(id, timestamp, block_id, offset, length, even_if_same_timestamp, reorg)
    }

    pub fn get(&self, id: I) -> crate::entry::Location {
        let idx = self.index_of(id.key_a());
        self.roots[idx].get(id)
    }

    pub fn discard(&self, lo_a: u64, hi_a: u64, mask: u64) {
        for root in &self.roots {
            root.discard(lo_a, hi_a, mask);
        }
    }

    pub fn for_each_entry(&self, visit: &mut dyn FnMut(&Entry) -> bool) -> bool {
        for root in &self.roots {
            if !root.for_each_entry(visit) {
                return false;
            }
        }
        true
    }

    pub fn collect_group(&self, group_key_a: u64, group_key_b: u64) -> Vec<Entry> {
        let idx = self.index_of(group_key_a);
        let mut out = Vec::new();
        self.roots[idx].collect_group(group_key_a, group_key_b, &mut out);
        out
    }
}

/// `[lo, hi]` inclusive key_a bounds for root `index` out of `count` evenly
/// sized roots, with the last root absorbing any remainder up to `u64::MAX`.
fn span_of(index: usize, count: usize) -> RootSpan {
    let span = ((u64::MAX as u128 + 1) / count as u128) as u64;
    let lo = (index as u128 * span as u128) as u64;
    let hi = if index == count - 1 { u64::MAX } else { lo + span - 1 };
    RootSpan { lo, hi }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_partition_the_full_key_a_range() {
        for count in [1usize, 2, 4, 8] {
            let mut prev_hi: Option<u64> = None;
            for i in 0..count {
                let s = span_of(i, count);
                if let Some(prev) = prev_hi {
                    assert_eq!(s.lo, prev + 1);
                }
                prev_hi = Some(s.hi);
            }
            assert_eq!(prev_hi, Some(u64::MAX));
        }
    }

    #[test]
    fn single_root_spans_everything() {
        let s = span_of(0, 1);
        assert_eq!(s.lo, 0);
        assert_eq!(s.hi, u64::MAX);
    }
}
