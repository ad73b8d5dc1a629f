//! Outcome of a rate limit check.

use super::window::TimeWindow;

/// The verdict for one request, with the quota status reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request was admitted
    pub allowed: bool,
    /// The daily threshold when admitted, otherwise the tripped window's threshold
    pub limit: u64,
    /// Requests left before some window trips
    pub remaining: u64,
    /// When the relevant window clears, in milliseconds since the epoch
    pub reset_at_ms: u64,
    /// Seconds until the tripped window admits again; set only on rejection
    pub retry_after_secs: Option<u64>,
    /// The window that rejected the request
    pub violated_window: Option<TimeWindow>,
}

impl Decision {
    pub(crate) fn admitted(limit: u64, remaining: u64, now: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at_ms: now.saturating_add(TimeWindow::Day.millis()),
            retry_after_secs: None,
            violated_window: None,
        }
    }

    pub(crate) fn rejected(window: TimeWindow, limit: u64, retry_after_secs: u64, now: u64) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at_ms: now.saturating_add(retry_after_secs.saturating_mul(1_000)),
            retry_after_secs: Some(retry_after_secs),
            violated_window: Some(window),
        }
    }

    /// Reset instant in whole seconds since the epoch, rounded up.
    pub fn reset_at_secs(&self) -> u64 {
        self.reset_at_ms.div_ceil(1_000)
    }

    /// Value for the `Retry-After` header. Never below one second.
    pub fn retry_after_header(&self) -> Option<u64> {
        self.retry_after_secs.map(|secs| secs.max(1))
    }
}
