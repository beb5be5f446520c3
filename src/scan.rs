// Shared ScanCallback traversal. See spec.md §4.6 and the cutoffTimestamp /
// mask / notMask / maxCount semantics exercised by
// examples/original_source/valuelocmap_test.go's ScanCallback* tests, which
// this module's `stopped_at`/`more` accounting is built to match exactly.

use crate::entry::Entry;
use crate::identity::Identity;
use crate::root::RootArray;

/// Parameters of one `ScanCallback` invocation. `low_key_a`/`high_key_a` are
/// inclusive; `0` is the natural "no mask restriction" value for both
/// `mask` and `not_mask` since a real mask test never passes with an
/// all-zero mask in practice (mirrors the Go API's zero-value defaults).
pub struct ScanRequest {
    pub low_key_a: u64,
    pub high_key_a: u64,
    pub mask: u64,
    pub not_mask: u64,
    pub cutoff_timestamp: u64,
    pub max_count: u64,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            low_key_a: 0,
            high_key_a: u64::MAX,
            mask: 0,
            not_mask: 0,
            cutoff_timestamp: 0,
            max_count: u64::MAX,
        }
    }
}

/// Result of a `ScanCallback` pass. `stopped_at` is the highest key_a whose
/// owning root was scanned to completion; `more` is true iff `max_count` was
/// reached before the whole `[low_key_a, high_key_a]` range was exhausted.
pub struct ScanOutcome {
    pub stopped_at: u64,
    pub more: bool,
}

fn entry_matches(entry: &Entry, req: &ScanRequest) -> bool {
    if !entry.location.is_live() {
        return false;
    }
    if entry.key_a < req.low_key_a || entry.key_a > req.high_key_a {
        return false;
    }
    if req.cutoff_timestamp != 0 && entry.location.timestamp > req.cutoff_timestamp {
        return false;
    }
    if req.mask != 0 && (entry.location.timestamp & req.mask) != req.mask {
        return false;
    }
    if req.not_mask != 0 && (entry.location.timestamp & req.not_mask) != 0 {
        return false;
    }
    true
}

/// Walk roots in ascending key_a order, invoking `callback` for every
/// matching entry until `max_count` is hit, `callback` returns `false`, or
/// the range is exhausted. The value variant's public API never lets a
/// caller stop early, so it always passes a callback that returns `true`;
/// the group variant's `cb returns a boolean` (spec.md §4.1) threads its
/// caller's return value straight through here.
///
/// A root can't be pruned below the entry level (routing below the root
/// uses `route_words`, not key_a — spec.md §4.2), so every root overlapping
/// `[low_key_a, high_key_a]` is walked in full; `stopped_at` tracks the
/// upper bound of the last root fully completed.
pub(crate) fn scan<I: Identity + Send + Sync + 'static>(
    roots: &RootArray<I>,
    req: &ScanRequest,
    mut callback: impl FnMut(&Entry) -> bool,
) -> ScanOutcome {
    let mut count: u64 = 0;
    let mut stopped_at: u64 = req.low_key_a.saturating_sub(1);
    let mut more = false;

    'roots: for idx in 0..roots.len() {
        let span = roots.span(idx);
        if span.lo > req.high_key_a {
            break;
        }
        if span.hi < req.low_key_a {
            continue;
        }

        let fully_scanned = roots.root(idx).for_each_entry(&mut |entry| {
            if !entry_matches(entry, req) {
                return true;
            }
            if count >= req.max_count {
                return false;
            }
            let keep_going = callback(entry);
            count += 1;
            keep_going && count < req.max_count
        });

        if !fully_scanned || count >= req.max_count {
            more = true;
            break 'roots;
        }
        stopped_at = span.hi.min(req.high_key_a);
    }

    ScanOutcome { stopped_at, more }
}
