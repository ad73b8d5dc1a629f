//! Rate limit thresholds.
//!
//! A single set of thresholds applies to every client: one limit per
//! [`TimeWindow`]. A threshold of zero rejects every request.

use super::window::TimeWindow;

/// Default requests allowed per second.
pub const DEFAULT_PER_SECOND: u64 = 5;
/// Default requests allowed per minute.
pub const DEFAULT_PER_MINUTE: u64 = 50;
/// Default requests allowed per day.
pub const DEFAULT_PER_DAY: u64 = 5_000;

/// Thresholds for the three windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum admitted requests in any trailing second
    pub per_second: u64,
    /// Maximum admitted requests in any trailing minute
    pub per_minute: u64,
    /// Maximum admitted requests in any trailing day
    pub per_day: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: DEFAULT_PER_SECOND,
            per_minute: DEFAULT_PER_MINUTE,
            per_day: DEFAULT_PER_DAY,
        }
    }
}

impl RateLimitConfig {
    /// Create a configuration from explicit thresholds.
    pub fn new(per_second: u64, per_minute: u64, per_day: u64) -> Self {
        Self {
            per_second,
            per_minute,
            per_day,
        }
    }

    /// The threshold that applies to `window`.
    pub fn threshold(&self, window: TimeWindow) -> u64 {
        match window {
            TimeWindow::Second => self.per_second,
            TimeWindow::Minute => self.per_minute,
            TimeWindow::Day => self.per_day,
        }
    }

    /// Whether the thresholds grow with the window length.
    ///
    /// Inconsistent thresholds are still honored; whichever window fills
    /// first rejects.
    pub fn is_ordered(&self) -> bool {
        self.per_second <= self.per_minute && self.per_minute <= self.per_day
    }
}
