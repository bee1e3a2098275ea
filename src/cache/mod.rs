// Cache module.
// Two tiers: an in-memory stale-while-revalidate cache in front of a
// size-bounded persistent disk cache, plus the batch tree fetcher.

pub(crate) mod batch;
pub mod disk;
pub mod memory;

pub use disk::{CACHE_VERSION, CacheEntry, CacheStats, DiskCache};
pub use memory::{Freshness, SwrCache};
