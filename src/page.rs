// Fixed-capacity open-addressed hash page with an overflow chain. See
// spec.md §3 ("Page") and §4.3 ("Open-addressed page with overflow chain").
//
// The lock granularity story (one short critical section per container,
// cloned/read-locked references kept alive across structural changes) is
// grounded on `Arc<RwLock<Bucket<K, V>>>` in the teacher's
// `src/index/hash_index.rs`; here the container is simpler (no directory
// indirection needed within a page) so a single `parking_lot::Mutex<Page>`
// suffices.

use crate::entry::{Entry, Location};
use crate::identity::Identity;

/// Sentinel meaning "end of chain" / "not in freelist".
const NONE: u32 = u32::MAX;

/// Number of entries an overflow extension grows by at a time. Chosen so a
/// page with `page_size == 1` that collects 99 overflow entries grows in 25
/// extensions (ceil(99 / 4)) — the shape spec.md §8 scenario 4 exercises.
const OVERFLOW_CHUNK: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Address {
    Primary(usize),
    Overflow(usize),
}

/// A leaf-level container of entries: the unit of splitting and merging.
pub struct Page {
    mask: u64,
    primary: Vec<Entry>,
    primary_next: Vec<u32>,
    overflow: Vec<Entry>,
    overflow_next: Vec<u32>,
    freelist: Vec<u32>,
    used: u32,
    page_size: usize,
}

impl Page {
    pub fn new(page_size: usize) -> Self {
        debug_assert!(page_size.is_power_of_two());
        Self {
            mask: (page_size - 1) as u64,
            primary: vec![Entry::default(); page_size],
            primary_next: vec![NONE; page_size],
            overflow: Vec::new(),
            overflow_next: Vec::new(),
            freelist: Vec::new(),
            used: 0,
            page_size,
        }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    fn addr_of(&self, idx: usize) -> Address {
        if idx < self.page_size {
            Address::Primary(idx)
        } else {
            Address::Overflow(idx - self.page_size)
        }
    }

    fn entry_at(&self, addr: Address) -> &Entry {
        match addr {
            Address::Primary(i) => &self.primary[i],
            Address::Overflow(i) => &self.overflow[i],
        }
    }

    fn entry_at_mut(&mut self, addr: Address) -> &mut Entry {
        match addr {
            Address::Primary(i) => &mut self.primary[i],
            Address::Overflow(i) => &mut self.overflow[i],
        }
    }

    fn next_of(&self, addr: Address) -> u32 {
        match addr {
            Address::Primary(i) => self.primary_next[i],
            Address::Overflow(i) => self.overflow_next[i],
        }
    }

    fn set_next(&mut self, addr: Address, next: u32) {
        match addr {
            Address::Primary(i) => self.primary_next[i] = next,
            Address::Overflow(i) => self.overflow_next[i] = next,
        }
    }

    /// Walk the chain anchored at `slot`, returning the address of the slot
    /// holding `id`'s entry (whether primary or overflow) and the address of
    /// its predecessor in the chain, if it has one.
    fn find<I: Identity>(&self, id: &I) -> Option<(Address, Option<Address>)> {
        let slot = (id.slot_hash() & self.mask) as usize;
        if !self.primary[slot].is_empty() && id.matches(&self.primary[slot]) {
            return Some((Address::Primary(slot), None));
        }
        let mut prev = Address::Primary(slot);
        let mut cur = self.primary_next[slot];
        while cur != NONE {
            let addr = self.addr_of(cur as usize);
            if id.matches(self.entry_at(addr)) {
                return Some((addr, Some(prev)));
            }
            prev = addr;
            cur = self.next_of(addr);
        }
        None
    }

    /// Allocate a fresh overflow slot, growing the overflow region in chunks
    /// of [`OVERFLOW_CHUNK`] when the freelist is empty.
    fn alloc_overflow(&mut self) -> usize {
        if let Some(addr) = self.freelist.pop() {
            return addr as usize;
        }
        let base = self.overflow.len();
        self.overflow.resize(base + OVERFLOW_CHUNK, Entry::default());
        self.overflow_next.resize(base + OVERFLOW_CHUNK, NONE);
        // Hand back the first slot of the new chunk, bank the rest.
        for i in (base + 1)..(base + OVERFLOW_CHUNK) {
            self.freelist.push((self.page_size + i) as u32);
        }
        self.page_size + base
    }

    /// Number of overflow extensions allocated so far (used only by tests
    /// mirroring spec.md §8 scenario 4's `len(overflow)` assertion).
    #[cfg(test)]
    pub fn overflow_extensions(&self) -> usize {
        self.overflow.len() / OVERFLOW_CHUNK
    }

    /// Reconcile a Set against whatever is (or isn't) stored for `id`.
    /// Returns the prior timestamp, per spec.md §4.1.
    pub fn set<I: Identity>(
        &mut self,
        id: I,
        timestamp: u64,
        block_id: u32,
        offset: u32,
        length: u32,
        even_if_same_timestamp: bool,
    ) -> u64 {
        if let Some((addr, _)) = self.find(&id) {
            let existing = *self.entry_at(addr);
            let old_ts = existing.location.timestamp;
            let wins = timestamp > old_ts || (timestamp == old_ts && even_if_same_timestamp);
            if !wins {
                return old_ts;
            }
            let new_location = if block_id == 0 {
                Location { timestamp, block_id: 0, offset: 0, length: 0 }
            } else {
                Location { timestamp, block_id, offset, length }
            };
            if new_location.is_empty() {
                // Never stored with timestamp 0; a winning write always
                // carries timestamp > 0 per the reconciliation rules above.
                unreachable!("winning Set must carry a non-zero timestamp");
            }
            self.entry_at_mut(addr).location = new_location;
            return old_ts;
        }

        if block_id == 0 {
            // No existing slot and a tombstone write: no-op (spec.md §4.1).
            return 0;
        }

        let slot = (id.slot_hash() & self.mask) as usize;
        let mut entry = Entry::default();
        id.write_into(&mut entry);
        entry.location = Location { timestamp, block_id, offset, length };

        if self.primary[slot].is_empty() {
            self.primary[slot] = entry;
        } else {
            let new_addr_idx = self.alloc_overflow();
            self.overflow[new_addr_idx - self.page_size] = entry;
            // Link at the tail of the chain anchored at `slot`.
            let mut tail = Address::Primary(slot);
            while self.next_of(tail) != NONE {
                tail = self.addr_of(self.next_of(tail) as usize);
            }
            self.set_next(tail, new_addr_idx as u32);
        }
        self.used += 1;
        0
    }

    pub fn get<I: Identity>(&self, id: I) -> Location {
        match self.find(&id) {
            Some((addr, _)) => {
                let entry = self.entry_at(addr);
                if entry.location.is_tombstone() {
                    Location::EMPTY
                } else {
                    entry.location
                }
            }
            None => Location::EMPTY,
        }
    }

    /// Unconditionally clear the slot for `id`, if present. Returns true if
    /// something was cleared.
    pub fn clear<I: Identity>(&mut self, id: I) -> bool {
        let Some((addr, prev)) = self.find(&id) else { return false };
        match addr {
            Address::Primary(p) => {
                let head_overflow = self.primary_next[p];
                if head_overflow == NONE {
                    self.primary[p] = Entry::default();
                } else {
                    let oi = head_overflow as usize - self.page_size;
                    self.primary[p] = self.overflow[oi];
                    self.primary_next[p] = self.overflow_next[oi];
                    self.overflow[oi] = Entry::default();
                    self.overflow_next[oi] = NONE;
                    self.freelist.push(head_overflow);
                }
            }
            Address::Overflow(o) => {
                let next = self.overflow_next[o];
                match prev.expect("overflow slot always has a predecessor") {
                    Address::Primary(p) => self.primary_next[p] = next,
                    Address::Overflow(pi) => self.overflow_next[pi] = next,
                }
                self.overflow[o] = Entry::default();
                self.overflow_next[o] = NONE;
                self.freelist.push((self.page_size + o) as u32);
            }
        }
        self.used -= 1;
        true
    }

    /// Insert an already-reconciled entry verbatim (used by split/merge to
    /// rehome live entries into fresh pages without re-running Set
    /// reconciliation, which has already happened).
    pub fn insert_raw<I: Identity>(&mut self, entry: Entry) {
        let id = I::from_entry(&entry);
        let slot = (id.slot_hash() & self.mask) as usize;
        if self.primary[slot].is_empty() {
            self.primary[slot] = entry;
        } else {
            let new_addr_idx = self.alloc_overflow();
            self.overflow[new_addr_idx - self.page_size] = entry;
            let mut tail = Address::Primary(slot);
            while self.next_of(tail) != NONE {
                tail = self.addr_of(self.next_of(tail) as usize);
            }
            self.set_next(tail, new_addr_idx as u32);
        }
        self.used += 1;
    }

    /// All live (non-empty) entries, primary and overflow, in no particular
    /// order. Used by split, merge, scan, discard, and stats.
    pub fn iter_entries(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.primary
            .iter()
            .chain(self.overflow.iter())
            .filter(|e| !e.is_empty())
    }

    /// Clear every live entry matching `pred`. Collects identities first
    /// since `clear` restructures the chain it's called on.
    pub fn discard_matching<I: Identity>(&mut self, mut pred: impl FnMut(&Entry) -> bool) -> u32 {
        let victims: Vec<I> = self.iter_entries().filter(|e| pred(e)).map(I::from_entry).collect();
        let mut cleared = 0;
        for id in victims {
            if self.clear(id) {
                cleared += 1;
            }
        }
        cleared
    }
}
