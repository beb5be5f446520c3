// Trie node: a leaf wrapping one Page, or a branch with two children picked
// by one hash bit. See spec.md §3 ("Node") and §4.4/§4.5 (split/merge).
//
// Reader/writer coordination follows the ownership-reference alternative
// spec.md §9 sanctions instead of epoch/hazard reclamation: each node lives
// behind `Arc<RwLock<NodeState<I>>>`; a caller clones the `Arc` it needs
// before releasing the parent's read lock, so a structural swap never
// invalidates a reference already in another thread's hands. Writers that
// raced a swap re-validate (`Arc::ptr_eq`) after acquiring the leaf's page
// lock and retry from the point of divergence — this is what keeps a split
// or merge from silently dropping a concurrent Set (spec.md §3's "Splits and
// merges never lose ... a key's reconciliation state").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::entry::{Entry, Location};
use crate::identity::{route_bit, Identity};
use crate::page::Page;

/// Shared, immutable-after-construction sizing knobs every node in one map
/// instance consults. Cheap to clone (just an `Arc` bump) so each `Node`
/// carries one instead of duplicating `page_size`/`split_level` fields.
#[derive(Debug)]
pub(crate) struct EngineConfig {
    pub page_size: usize,
    pub split_level: usize,
    pub merge_level: usize,
}

pub(crate) enum NodeState<I: Identity> {
    Leaf(Arc<Mutex<Page>>),
    Branch(Arc<Node<I>>, Arc<Node<I>>),
}

enum Snapshot<I: Identity> {
    Leaf(Arc<Mutex<Page>>),
    Branch(Arc<Node<I>>, Arc<Node<I>>),
}

pub(crate) struct Node<I: Identity> {
    level: u32,
    cfg: Arc<EngineConfig>,
    state: RwLock<NodeState<I>>,
    used: AtomicU64,
}

impl<I: Identity + Send + Sync + 'static> Node<I> {
    pub fn new_leaf(level: u32, cfg: Arc<EngineConfig>) -> Arc<Self> {
        let page_size = cfg.page_size;
        Self::new_leaf_with_page(level, cfg, Page::new(page_size))
    }

    fn new_leaf_with_page(level: u32, cfg: Arc<EngineConfig>, page: Page) -> Arc<Self> {
        let used = page.used() as u64;
        Arc::new(Self {
            level,
            cfg,
            state: RwLock::new(NodeState::Leaf(Arc::new(Mutex::new(page)))),
            used: AtomicU64::new(used),
        })
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> Snapshot<I> {
        match &*self.state.read() {
            NodeState::Leaf(p) => Snapshot::Leaf(p.clone()),
            NodeState::Branch(l, r) => Snapshot::Branch(l.clone(), r.clone()),
        }
    }

    fn leaf_page(&self) -> Option<Arc<Mutex<Page>>> {
        match &*self.state.read() {
            NodeState::Leaf(p) => Some(p.clone()),
            NodeState::Branch(..) => None,
        }
    }

    fn is_current_leaf(&self, page: &Arc<Mutex<Page>>) -> bool {
        matches!(&*self.state.read(), NodeState::Leaf(p) if Arc::ptr_eq(p, page))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set(
        self: &Arc<Self>,
        id: I,
        timestamp: u64,
        block_id: u32,
        offset: u32,
        length: u32,
        even_if_same_timestamp: bool,
        reorg: &dyn ReorgSink<I>,
    ) -> u64 {
        loop {
            match self.snapshot() {
                Snapshot::Leaf(page) => {
                    let mut guard = page.lock();
                    if !self.is_current_leaf(&page) {
                        drop(guard);
                        continue;
                    }
                    let old = guard.set(id, timestamp, block_id, offset, length, even_if_same_timestamp);
                    let used_now = guard.used();
                    drop(guard);
                    self.used.store(used_now as u64, Ordering::Relaxed);
                    if used_now as usize >= self.cfg.split_level {
                        reorg.schedule_split(self.clone());
                    }
                    return old;
                }
                Snapshot::Branch(left, right) => {
                    let child = if route_bit(id.route_words(), self.level) { right } else { left };
                    return child.set(id, timestamp, block_id, offset, length, even_if_same_timestamp, reorg);
                }
            }
        }
    }

    pub fn get(self: &Arc<Self>, id: I) -> Location {
        match self.snapshot() {
            Snapshot::Leaf(page) => page.lock().get(id),
            Snapshot::Branch(left, right) => {
                let child = if route_bit(id.route_words(), self.level) { &right } else { &left };
                child.get(id)
            }
        }
    }

    /// Clear every live entry with `key_a` in `[lo_a, hi_a]` whose timestamp
    /// overlaps `mask`. Runs a full subtree walk: below the root the trie is
    /// keyed on `route_words`, not `key_a`, so no subtree can be pruned by
    /// key_a alone (spec.md §4.2).
    pub fn discard(self: &Arc<Self>, lo_a: u64, hi_a: u64, mask: u64) {
        loop {
            match self.snapshot() {
                Snapshot::Leaf(page) => {
                    let mut guard = page.lock();
                    if !self.is_current_leaf(&page) {
                        drop(guard);
                        continue;
                    }
                    guard.discard_matching::<I>(|e| {
                        e.key_a >= lo_a && e.key_a <= hi_a && (e.location.timestamp & mask) != 0
                    });
                    let used_now = guard.used();
                    drop(guard);
                    self.used.store(used_now as u64, Ordering::Relaxed);
                    return;
                }
                Snapshot::Branch(left, right) => {
                    left.discard(lo_a, hi_a, mask);
                    right.discard(lo_a, hi_a, mask);
                    self.used.store(left.used() + right.used(), Ordering::Relaxed);
                    self.maybe_merge(&left, &right);
                    return;
                }
            }
        }
    }

    /// Visits every live entry in this subtree, regardless of key_a (the
    /// caller applies the key_a/mask/notMask/cutoff filters — see
    /// `crate::scan`). `visit` returns `false` to stop the walk early (the
    /// `max_count` cap); the return value here propagates that upward.
    pub fn for_each_entry(&self, visit: &mut dyn FnMut(&Entry) -> bool) -> bool {
        match self.snapshot() {
            Snapshot::Leaf(page) => {
                let guard = page.lock();
                for entry in guard.iter_entries() {
                    if !visit(entry) {
                        return false;
                    }
                }
                true
            }
            Snapshot::Branch(left, right) => left.for_each_entry(visit) && right.for_each_entry(visit),
        }
    }

    fn maybe_merge(self: &Arc<Self>, left: &Arc<Node<I>>, right: &Arc<Node<I>>) {
        let Some(lp) = left.leaf_page() else { return };
        let Some(rp) = right.leaf_page() else { return };
        if (left.used() + right.used()) as usize > self.cfg.merge_level {
            return;
        }

        let mut lg = lp.lock();
        let mut rg = rp.lock();
        if (lg.used() + rg.used()) as usize > self.cfg.merge_level {
            return;
        }

        let mut merged = Page::new(self.cfg.page_size);
        for entry in lg.iter_entries() {
            merged.insert_raw::<I>(*entry);
        }
        for entry in rg.iter_entries() {
            merged.insert_raw::<I>(*entry);
        }
        drop(lg);
        drop(rg);
        let merged_used = merged.used() as u64;
        let merged_arc = Arc::new(Mutex::new(merged));

        // Point *both* children at the merged page too, not just the parent:
        // a writer already past the parent's dispatch but still waiting on
        // `lp`/`rp` re-validates against the child it called into, and a
        // stale child pointing nowhere would swallow that write forever.
        let mut lstate = left.state.write();
        if !matches!(&*lstate, NodeState::Leaf(p) if Arc::ptr_eq(p, &lp)) {
            return;
        }
        let mut rstate = right.state.write();
        if !matches!(&*rstate, NodeState::Leaf(p) if Arc::ptr_eq(p, &rp)) {
            return;
        }
        let mut sstate = self.state.write();
        if !matches!(&*sstate, NodeState::Branch(l, r) if Arc::ptr_eq(l, left) && Arc::ptr_eq(r, right)) {
            return;
        }

        *lstate = NodeState::Leaf(merged_arc.clone());
        *rstate = NodeState::Leaf(merged_arc.clone());
        *sstate = NodeState::Leaf(merged_arc);
        drop(lstate);
        drop(rstate);
        drop(sstate);

        left.used.store(merged_used, Ordering::Relaxed);
        right.used.store(merged_used, Ordering::Relaxed);
        self.used.store(merged_used, Ordering::Relaxed);
        tracing::debug!(level = self.level, merged_used, "merged sibling leaves");
    }

    /// Split this leaf into a branch of two fresh leaves, re-routing every
    /// live entry by the bit at this node's level. No-op if the node is no
    /// longer an over-threshold leaf by the time the write lock lands (a
    /// concurrent split already handled it, or the population has since
    /// shrunk).
    pub fn try_split(self: &Arc<Self>) {
        let Some(page) = self.leaf_page() else { return };
        // Hold the page lock for the whole copy + swap: any Set/Get racing
        // against this split blocks on the same per-page lock spec.md §3
        // already calls for, so no entry can be written to (and lost from)
        // the old page while we drain it.
        let mut guard = page.lock();
        if guard.used() as usize < self.cfg.split_level {
            return;
        }
        let mut left_page = Page::new(self.cfg.page_size);
        let mut right_page = Page::new(self.cfg.page_size);
        for entry in guard.iter_entries() {
            let id = I::from_entry(entry);
            if route_bit(id.route_words(), self.level) {
                right_page.insert_raw::<I>(*entry);
            } else {
                left_page.insert_raw::<I>(*entry);
            }
        }
        let left_used = left_page.used() as u64;
        let right_used = right_page.used() as u64;
        let left = Node::new_leaf_with_page(self.level + 1, self.cfg.clone(), left_page);
        let right = Node::new_leaf_with_page(self.level + 1, self.cfg.clone(), right_page);

        let mut state = self.state.write();
        if !matches!(&*state, NodeState::Leaf(p) if Arc::ptr_eq(p, &page)) {
            return;
        }
        *state = NodeState::Branch(left, right);
        drop(state);
        drop(guard);
        self.used.store(left_used + right_used, Ordering::Relaxed);
        tracing::debug!(level = self.level, left_used, right_used, "split leaf");
    }

    /// Descend for `GetGroup`: below level 64 every member of a group shares
    /// the same bit (it's derived purely from `group_key_b`), so a single
    /// path suffices. Past level 64, routing also depends on `name_hash`
    /// (unknown to the caller), so both children must be searched.
    pub fn collect_group(&self, group_key_a: u64, group_key_b: u64, out: &mut Vec<Entry>) {
        match self.snapshot() {
            Snapshot::Leaf(page) => {
                let guard = page.lock();
                for entry in guard.iter_entries() {
                    if entry.key_a == group_key_a && entry.key_b == group_key_b && entry.location.is_live() {
                        out.push(*entry);
                    }
                }
            }
            Snapshot::Branch(left, right) => {
                if self.level < 64 {
                    let bit = route_bit([group_key_b, 0], self.level);
                    let child = if bit { &right } else { &left };
                    child.collect_group(group_key_a, group_key_b, out);
                } else {
                    left.collect_group(group_key_a, group_key_b, out);
                    right.collect_group(group_key_a, group_key_b, out);
                }
            }
        }
    }
}

/// Abstraction over "hand this split job to a background worker" vs "just
/// run it inline" so `Node::set` doesn't need to know which. See
/// `crate::reorg`.
pub(crate) trait ReorgSink<I: Identity + Send + Sync + 'static>: Send + Sync {
    fn schedule_split(&self, node: Arc<Node<I>>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ValueKey;

    struct Inline;
    impl<I: Identity + Send + Sync + 'static> ReorgSink<I> for Inline {
        fn schedule_split(&self, node: Arc<Node<I>>) {
            node.try_split();
        }
    }

    fn vk(a: u64, b: u64) -> ValueKey {
        ValueKey { key_a: a, key_b: b }
    }

    fn cfg(page_size: usize, split_multiplier: usize) -> Arc<EngineConfig> {
        Arc::new(EngineConfig {
            page_size,
            split_level: page_size * split_multiplier,
            merge_level: (page_size * split_multiplier) / 4,
        })
    }

    #[test]
    fn set_then_get_round_trips_through_a_split() {
        let cfg = cfg(4, 2);
        let root: Arc<Node<ValueKey>> = Node::new_leaf(0, cfg);
        let inline = Inline;
        for i in 0..200u64 {
            root.set(vk(0, i), 1, 1, 0, 0, false, &inline);
        }
        for i in 0..200u64 {
            assert_eq!(root.get(vk(0, i)).as_tuple(), (1, 1, 0, 0));
        }
    }

    #[test]
    fn discard_then_merge_round_trips() {
        let cfg = cfg(4, 2);
        let root: Arc<Node<ValueKey>> = Node::new_leaf(0, cfg);
        let inline = Inline;
        for i in 0..200u64 {
            root.set(vk(0, i), 1, 1, 0, 0, false, &inline);
        }
        root.discard(0, u64::MAX, 1);
        for i in 0..200u64 {
            assert_eq!(root.get(vk(0, i)).as_tuple(), (0, 0, 0, 0));
        }
    }
}
