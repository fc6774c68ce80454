// Cache store for resolved release URLs.
// Insert-if-absent entries with last-access tracking and time-based eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;

use crate::error::ResolveError;

/// Result of a resolution as kept in the cache: a URL or a memoized failure.
pub type CachedResolution = std::result::Result<String, ResolveError>;

/// Key/value store the resolver memoizes into.
pub trait ResolutionCache: Send + Sync {
    /// Look up `key`, refreshing its last access time when present.
    fn get(&self, key: &str) -> Option<CachedResolution>;

    /// Insert `resolution` unless `key` is already cached; always refreshes last access.
    fn put(&self, key: &str, resolution: CachedResolution);
}

/// Default maximum idle time of an entry: 10 minutes.
pub const DEFAULT_MAX_TTL: Duration = Duration::from_secs(10 * 60);

/// Default sweep interval: 1 minute.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Idle time after which an entry becomes eligible for removal.
    pub max_ttl: Duration,
    /// How often the sweeper scans for idle entries.
    pub sweep_interval: Duration,
    /// Capacity hint for the backing map.
    pub initial_capacity: usize,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self {
            max_ttl: DEFAULT_MAX_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            initial_capacity: 128,
        }
    }

    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    error: Option<ResolveError>,
    /// Epoch seconds; atomic so readers can touch it under the shared lock.
    last_access: AtomicI64,
}

impl CacheEntry {
    fn new(resolution: CachedResolution, now: i64) -> Self {
        let (value, error) = match resolution {
            Ok(value) => (value, None),
            Err(error) => (String::new(), Some(error)),
        };
        Self {
            value,
            error,
            last_access: AtomicI64::new(now),
        }
    }

    fn touch(&self, now: i64) {
        self.last_access.store(now, Ordering::Relaxed);
    }

    fn resolution(&self) -> CachedResolution {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.value.clone()),
        }
    }

    fn idle_for(&self, now: i64) -> i64 {
        now - self.last_access.load(Ordering::Relaxed)
    }
}

/// In-memory cache whose entries expire after being idle for `max_ttl`.
///
/// Unbounded by count: only the sweeper removes entries.
#[derive(Debug)]
pub struct TtlCache {
    items: RwLock<HashMap<String, CacheEntry>>,
    max_ttl_secs: i64,
    /// Source of epoch seconds for access times and sweeps.
    clock: fn() -> i64,
}

impl TtlCache {
    /// Create a cache without a sweeper. See [`TtlCache::spawn`].
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            items: RwLock::new(HashMap::with_capacity(config.initial_capacity)),
            max_ttl_secs: i64::try_from(config.max_ttl.as_secs()).unwrap_or(i64::MAX),
            clock: now_epoch,
        }
    }

    /// Replace the wall clock, e.g. with a manually advanced one.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_secs.unsigned_abs())
    }

    /// Current time in epoch seconds according to this cache's clock.
    pub fn now(&self) -> i64 {
        (self.clock)()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Remove every entry idle for longer than `max_ttl` as of `now` (epoch seconds).
    ///
    /// Holds the exclusive lock for the whole scan. Returns the number removed.
    pub fn evict_expired(&self, now: i64) -> usize {
        let mut items = self.items.write();
        let before = items.len();
        let max_ttl = self.max_ttl_secs;
        items.retain(|_, entry| entry.idle_for(now) <= max_ttl);
        before - items.len()
    }

    fn get_at(&self, key: &str, now: i64) -> Option<CachedResolution> {
        let items = self.items.read();
        let entry = items.get(key)?;
        entry.touch(now);
        Some(entry.resolution())
    }

    fn put_at(&self, key: &str, resolution: CachedResolution, now: i64) {
        let mut items = self.items.write();
        match items.get(key) {
            Some(entry) => entry.touch(now),
            None => {
                items.insert(key.to_string(), CacheEntry::new(resolution, now));
            }
        }
    }
}

impl ResolutionCache for TtlCache {
    fn get(&self, key: &str) -> Option<CachedResolution> {
        self.get_at(key, self.now())
    }

    fn put(&self, key: &str, resolution: CachedResolution) {
        self.put_at(key, resolution, self.now())
    }
}

/// Cache that never stores anything; every lookup is a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl ResolutionCache for NoopCache {
    fn get(&self, _key: &str) -> Option<CachedResolution> {
        None
    }

    fn put(&self, _key: &str, _resolution: CachedResolution) {}
}

/// Current wall clock time in epoch seconds.
fn now_epoch() -> i64 {
    Utc::now().timestamp()
}
