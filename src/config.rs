// Configuration surface, mirroring the builder-and-normalize pattern the
// teacher uses for its own `Config` (src/lib.rs): out-of-range values are
// rounded up to something sane at construction rather than rejected, since
// the map itself can never observe a malformed config once built (spec §7).

/// Construction options for [`crate::ValueLocMap`] / [`crate::GroupLocMap`].
#[derive(Debug, Clone)]
pub struct LocMapOptions {
    pub(crate) roots: usize,
    pub(crate) page_size: usize,
    pub(crate) split_multiplier: usize,
    pub(crate) workers: usize,
    pub(crate) inactive_mask: u64,
}

impl Default for LocMapOptions {
    fn default() -> Self {
        Self {
            roots: 1,
            page_size: 1 << 16,
            split_multiplier: 3,
            workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            inactive_mask: 0,
        }
    }
}

impl LocMapOptions {
    pub fn builder() -> LocMapOptionsBuilder {
        LocMapOptionsBuilder::default()
    }

    /// Number of top-level shards, already rounded up to a power of two.
    pub fn roots(&self) -> usize {
        self.roots
    }

    /// Slots per page, already rounded up to a power of two.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn split_level(&self) -> usize {
        self.page_size * self.split_multiplier
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn inactive_mask(&self) -> u64 {
        self.inactive_mask
    }

    fn normalize(mut self) -> Self {
        self.roots = self.roots.max(1).next_power_of_two();
        self.page_size = self.page_size.max(1).next_power_of_two();
        self.split_multiplier = self.split_multiplier.max(1);
        self.workers = self.workers.max(1);
        self
    }
}

/// Fluent builder for [`LocMapOptions`].
#[derive(Debug, Clone, Default)]
pub struct LocMapOptionsBuilder {
    inner: OptionalFields,
}

#[derive(Debug, Clone, Default)]
struct OptionalFields {
    roots: Option<usize>,
    page_size: Option<usize>,
    split_multiplier: Option<usize>,
    workers: Option<usize>,
    inactive_mask: Option<u64>,
}

impl LocMapOptionsBuilder {
    /// Minimum number of top-level shards; rounded up to a power of two.
    pub fn roots(mut self, roots: usize) -> Self {
        self.inner.roots = Some(roots);
        self
    }

    /// Slots per page; rounded up to a power of two.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.inner.page_size = Some(page_size);
        self
    }

    /// A leaf splits once `used >= page_size * split_multiplier`.
    pub fn split_multiplier(mut self, split_multiplier: usize) -> Self {
        self.inner.split_multiplier = Some(split_multiplier);
        self
    }

    /// Number of background reorganization workers. `1` runs inline.
    pub fn workers(mut self, workers: usize) -> Self {
        self.inner.workers = Some(workers);
        self
    }

    /// Bitmask over timestamp consulted by the next `gather_stats` call.
    pub fn inactive_mask(mut self, mask: u64) -> Self {
        self.inner.inactive_mask = Some(mask);
        self
    }

    pub fn build(self) -> LocMapOptions {
        let defaults = LocMapOptions::default();
        LocMapOptions {
            roots: self.inner.roots.unwrap_or(defaults.roots),
            page_size: self.inner.page_size.unwrap_or(defaults.page_size),
            split_multiplier: self.inner.split_multiplier.unwrap_or(defaults.split_multiplier),
            workers: self.inner.workers.unwrap_or(defaults.workers),
            inactive_mask: self.inner.inactive_mask.unwrap_or(defaults.inactive_mask),
        }
        .normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_are_already_normalized() {
        let opts = LocMapOptions::builder().build();
        assert_eq!(opts.roots().count_ones(), 1);
        assert_eq!(opts.page_size().count_ones(), 1);
    }

    #[test]
    fn roots_round_up_to_power_of_two() {
        let opts = LocMapOptions::builder().roots(16).build();
        assert!(opts.roots() >= 16);
        assert_eq!(opts.roots(), 16);

        let opts = LocMapOptions::builder().roots(17).build();
        assert!(opts.roots() >= 17);
        assert_eq!(opts.roots(), 32);
    }

    #[test]
    fn page_size_rounds_up_and_split_level_follows() {
        let opts = LocMapOptions::builder().page_size(1).split_multiplier(1000).build();
        assert_eq!(opts.page_size(), 1);
        assert_eq!(opts.split_level(), 1000);
    }

    #[test]
    fn workers_is_never_zero() {
        let opts = LocMapOptions::builder().workers(0).build();
        assert_eq!(opts.workers(), 1);
    }
}
