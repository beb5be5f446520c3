//! Concurrent in-memory index mapping a 128-bit key (192-bit for the grouped
//! variant) to a `(timestamp, block_id, offset, length)` location tuple —
//! the metadata half of a log-structured object store.
//!
//! Two variants share one generic engine: [`ValueLocMap`] keys on `(key_a,
//! key_b)`, [`GroupLocMap`] keys on `(group_key_a, group_key_b, name_hash)`
//! and additionally supports enumerating a whole group. Both are built on
//! the same trie of fixed-capacity pages, shared via an internal `Identity`
//! trait that factors the value/group axis out of the trie, page, split,
//! merge, and scan machinery.
//!
//! Out of scope: the log-block subsystem itself, replication, persistence of
//! the map, range queries by key order, secondary indexes, multi-version
//! history, and transactions spanning multiple keys.

mod config;
mod entry;
mod error;
mod group_map;
mod identity;
mod node;
mod page;
mod reorg;
mod root;
mod scan;
mod stats;
mod value_map;

pub use config::{LocMapOptions, LocMapOptionsBuilder};
pub use entry::{Entry, Location};
pub use error::{LocMapError, Result};
pub use group_map::GroupLocMap;
pub use scan::{ScanOutcome, ScanRequest};
pub use stats::Stats;
pub use value_map::ValueLocMap;
