// The slot payload stored in a Page. See spec.md §3.

/// Location tuple: where a value lives in the log, and when it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub timestamp: u64,
    pub block_id: u32,
    pub offset: u32,
    pub length: u32,
}

impl Location {
    pub const EMPTY: Location = Location { timestamp: 0, block_id: 0, offset: 0, length: 0 };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamp == 0
    }

    /// A tombstone has a real timestamp but no backing block.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.timestamp != 0 && self.block_id == 0
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.timestamp != 0 && self.block_id != 0
    }

    pub fn as_tuple(&self) -> (u64, u32, u32, u32) {
        (self.timestamp, self.block_id, self.offset, self.length)
    }
}

/// One slot in a page: the full key plus its location. `key_a`/`key_b` are
/// always present; `name_hash` is only meaningful for the group variant (it
/// is `0` and unused for the value variant).
#[derive(Debug, Clone, Copy, Default)]
pub struct Entry {
    pub key_a: u64,
    pub key_b: u64,
    pub name_hash: u64,
    pub location: Location,
}

impl Entry {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.location.is_empty()
    }
}
