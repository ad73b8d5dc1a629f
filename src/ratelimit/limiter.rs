//! Core sliding-window rate limiter.

use dashmap::DashMap;
use tracing::{debug, info, trace};

use super::decision::Decision;
use super::identity::ClientId;
use super::record::ClientRecord;
use super::rules::RateLimitConfig;
use super::window::TimeWindow;

/// Sliding-window rate limiter keyed by client identity.
///
/// Each client keeps the arrival times of its admitted requests for the last
/// day. A request is checked against the second, minute and day windows in
/// that order; rejected requests are not recorded and so do not consume
/// quota.
///
/// The registry is a sharded map. A check holds its client's shard lock for
/// the whole prune-count-append sequence, and [`RateLimiter::sweep`] takes
/// the same locks, so concurrent requests from one client cannot both slip
/// under a threshold.
pub struct RateLimiter {
    /// Thresholds applied to every client
    limits: RateLimitConfig,
    /// Request history indexed by client identity
    clients: DashMap<ClientId, ClientRecord>,
}

impl RateLimiter {
    /// Create a rate limiter with the given thresholds.
    pub fn new(limits: RateLimitConfig) -> Self {
        Self {
            limits,
            clients: DashMap::new(),
        }
    }

    /// The thresholds this limiter enforces.
    pub fn limits(&self) -> RateLimitConfig {
        self.limits
    }

    /// Decide whether a request from `client` arriving at `now` (milliseconds
    /// since the epoch) is admitted.
    pub fn check(&self, client: &ClientId, now: u64) -> Decision {
        let mut record = self.clients.entry(client.clone()).or_insert_with(|| {
            trace!(client = %client, "Tracking new client");
            ClientRecord::new()
        });

        record.prune(now);

        let mut remaining = u64::MAX;
        for window in TimeWindow::ALL {
            let threshold = self.limits.threshold(window);
            let count = record.count_within(window, now);

            if count >= threshold {
                let retry_after_secs = record
                    .oldest_within(window, now)
                    .map(|oldest| (oldest + window.millis()).saturating_sub(now).div_ceil(1_000))
                    .unwrap_or(0);

                debug!(
                    client = %client,
                    window = %window,
                    count,
                    threshold,
                    retry_after_secs,
                    "Rate limit exceeded"
                );
                return Decision::rejected(window, threshold, retry_after_secs, now);
            }

            remaining = remaining.min(threshold - count - 1);
        }

        record.push(now);
        Decision::admitted(self.limits.per_day, remaining, now)
    }

    /// Prune every client to the day window and forget clients with no
    /// remaining history. Returns the number of clients evicted.
    pub fn sweep(&self, now: u64) -> usize {
        let mut evicted = 0;
        self.clients.retain(|_, record| {
            record.prune(now);
            if record.is_empty() {
                evicted += 1;
                false
            } else {
                true
            }
        });

        if evicted > 0 {
            info!(evicted, remaining = self.clients.len(), "Swept idle rate limit clients");
        } else {
            debug!(clients = self.clients.len(), "Rate limit sweep found nothing to evict");
        }
        evicted
    }

    /// Number of tracked clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Number of recorded requests for `client`, or `None` if it is not
    /// tracked.
    pub fn tracked_requests(&self, client: &ClientId) -> Option<usize> {
        self.clients.get(client).map(|record| record.len())
    }

    /// Forget all clients.
    pub fn clear(&self) {
        self.clients.clear();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_000_000;

    fn client(key: &str) -> ClientId {
        ClientId::new(key)
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.client_count(), 0);
        assert_eq!(limiter.limits(), RateLimitConfig::default());
    }

    #[test]
    fn test_check_creates_record() {
        let limiter = RateLimiter::default();
        let decision = limiter.check(&client("a"), T0);

        assert!(decision.allowed);
        assert_eq!(limiter.client_count(), 1);
        assert_eq!(limiter.tracked_requests(&client("a")), Some(1));
    }

    #[test]
    fn test_admitted_reports_daily_limit_and_remaining() {
        let limiter = RateLimiter::new(RateLimitConfig::new(5, 50, 5_000));

        let first = limiter.check(&client("a"), T0);
        assert_eq!(first.limit, 5_000);
        assert_eq!(first.remaining, 4);
        assert_eq!(first.reset_at_ms, T0 + TimeWindow::Day.millis());

        let second = limiter.check(&client("a"), T0 + 10);
        assert_eq!(second.remaining, 3);
    }

    #[test]
    fn test_remaining_follows_tightest_window() {
        let limiter = RateLimiter::new(RateLimitConfig::new(10, 3, 100));

        assert_eq!(limiter.check(&client("a"), T0).remaining, 2);
        assert_eq!(limiter.check(&client("a"), T0 + 2_000).remaining, 1);
        assert_eq!(limiter.check(&client("a"), T0 + 4_000).remaining, 0);
    }

    #[test]
    fn test_sixth_request_in_a_second_is_rejected() {
        let limiter = RateLimiter::new(RateLimitConfig::new(5, 50, 5_000));

        for i in 0..5 {
            assert!(limiter.check(&client("a"), T0 + i * 150).allowed);
        }

        let decision = limiter.check(&client("a"), T0 + 900);
        assert!(!decision.allowed);
        assert_eq!(decision.violated_window, Some(TimeWindow::Second));
        assert_eq!(decision.limit, 5);
        assert_eq!(decision.remaining, 0);
        // Oldest entry (T0) leaves the window at T0 + 1000, 100ms away.
        assert_eq!(decision.retry_after_secs, Some(1));
        assert_eq!(decision.reset_at_ms, T0 + 900 + 1_000);
    }

    #[test]
    fn test_rejection_does_not_consume_quota() {
        let limiter = RateLimiter::new(RateLimitConfig::new(2, 50, 5_000));

        limiter.check(&client("a"), T0);
        limiter.check(&client("a"), T0 + 100);
        for i in 0..10 {
            assert!(!limiter.check(&client("a"), T0 + 200 + i).allowed);
        }
        assert_eq!(limiter.tracked_requests(&client("a")), Some(2));
    }

    #[test]
    fn test_zero_threshold_rejects_everything() {
        let limiter = RateLimiter::new(RateLimitConfig::new(0, 50, 5_000));

        let decision = limiter.check(&client("a"), T0);
        assert!(!decision.allowed);
        assert_eq!(decision.violated_window, Some(TimeWindow::Second));
        assert_eq!(decision.retry_after_secs, Some(0));
        assert_eq!(decision.retry_after_header(), Some(1));
    }

    #[test]
    fn test_minute_window_retry_after() {
        let limiter = RateLimiter::new(RateLimitConfig::new(10, 3, 5_000));

        limiter.check(&client("a"), T0);
        limiter.check(&client("a"), T0 + 10_000);
        limiter.check(&client("a"), T0 + 20_000);

        let decision = limiter.check(&client("a"), T0 + 30_500);
        assert_eq!(decision.violated_window, Some(TimeWindow::Minute));
        assert_eq!(decision.limit, 3);
        // T0 expires from the minute window at T0 + 60_000: 29.5s, rounded up.
        assert_eq!(decision.retry_after_secs, Some(30));
    }

    #[test]
    fn test_sweep_evicts_idle_clients() {
        let limiter = RateLimiter::default();
        limiter.check(&client("idle"), T0);
        limiter.check(&client("active"), T0 + TimeWindow::Day.millis() - 1);

        let evicted = limiter.sweep(T0 + TimeWindow::Day.millis());

        assert_eq!(evicted, 1);
        assert_eq!(limiter.client_count(), 1);
        assert_eq!(limiter.tracked_requests(&client("idle")), None);
        assert_eq!(limiter.tracked_requests(&client("active")), Some(1));
    }

    #[test]
    fn test_clear() {
        let limiter = RateLimiter::default();
        limiter.check(&client("a"), T0);
        limiter.clear();
        assert_eq!(limiter.client_count(), 0);
    }
}
