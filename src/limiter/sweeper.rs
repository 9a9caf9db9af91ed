//! Background eviction of idle limiters.

use governor::clock::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::cache::LimiterCache;

/// Spawn [`periodic_cleanup`] on the current runtime.
pub fn spawn_cleanup<C>(
    cache: Arc<LimiterCache<C>>,
    interval: Duration,
    idle_threshold: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    C: Clock + Send + Sync + 'static,
{
    tokio::spawn(periodic_cleanup(cache, interval, idle_threshold, shutdown))
}

/// Sweep `cache` every `interval` until `shutdown` is cancelled.
///
/// The first sweep happens one full interval after start. Cancellation is
/// observed while waiting, so the task exits without running another sweep.
pub async fn periodic_cleanup<C>(
    cache: Arc<LimiterCache<C>>,
    interval: Duration,
    idle_threshold: Duration,
    shutdown: CancellationToken,
) where
    C: Clock + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    debug!(
        interval_secs = interval.as_secs_f64(),
        idle_secs = idle_threshold.as_secs_f64(),
        "limiter cleanup started"
    );

    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                debug!("limiter cleanup stopped");
                return;
            }

            _ = ticker.tick() => {
                let evicted = cache.sweep(idle_threshold);
                if evicted > 0 {
                    debug!(evicted, remaining = cache.len(), "limiter cleanup pass complete");
                }
            }
        }
    }
}
