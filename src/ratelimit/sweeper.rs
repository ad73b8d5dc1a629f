//! Background eviction of idle clients.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::limiter::RateLimiter;
use crate::clock::Clock;

/// Spawn a task that calls [`RateLimiter::sweep`] every `interval` until
/// `shutdown` flips to `true` or its sender is dropped.
///
/// The first sweep happens one full interval after spawning. A zero
/// `interval` disables sweeping and the task exits immediately.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if interval.is_zero() {
            warn!("Sweep interval is zero; idle clients will not be evicted");
            return;
        }

        info!(interval_secs = interval.as_secs(), "Rate limit sweeper started");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    limiter.sweep(clock.now_millis());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Rate limit sweeper stopped");
    })
}
