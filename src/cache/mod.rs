// Cache module for memoized release resolutions.
// In-memory TTL store with a background sweeper owned by the caller.

pub mod store;
pub mod sweeper;

pub use store::{CacheConfig, CachedResolution, NoopCache, ResolutionCache, TtlCache};
pub use sweeper::SweeperHandle;
