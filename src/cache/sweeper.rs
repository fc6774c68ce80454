// Background expiry for the TTL cache.
// The sweeper task is owned through a handle that stops it on demand.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::store::{CacheConfig, TtlCache};

/// Handle to a running sweeper. Dropping it leaves the sweeper running.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "cache sweeper exited abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl TtlCache {
    /// Create a cache and start its sweeper on the current tokio runtime.
    pub fn spawn(config: CacheConfig) -> (Arc<Self>, SweeperHandle) {
        Self::new(&config).start_sweeper(config.sweep_interval)
    }

    /// Move an already built cache behind an `Arc` and sweep it every `sweep_interval`.
    pub fn start_sweeper(self, sweep_interval: Duration) -> (Arc<Self>, SweeperHandle) {
        let cache = Arc::new(self);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let every = sweep_interval.max(Duration::from_millis(1));

        let task = tokio::spawn(run_sweeper(Arc::clone(&cache), every, shutdown_rx));

        (cache, SweeperHandle { shutdown_tx, task })
    }
}

async fn run_sweeper(cache: Arc<TtlCache>, every: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_ms = every.as_millis() as u64,
        max_ttl_secs = cache.max_ttl().as_secs(),
        "starting cache sweeper"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = cache.evict_expired(cache.now());
                if evicted > 0 {
                    debug!(evicted, remaining = cache.len(), "evicted idle cache entries");
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("cache sweeper shutting down");
                    break;
                }
            }
        }
    }
}
