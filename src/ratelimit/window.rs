//! Trailing time windows evaluated on every request.

use std::fmt;
use std::time::Duration;

const SECOND_MS: u64 = 1_000;
const MINUTE_MS: u64 = 60 * SECOND_MS;
const DAY_MS: u64 = 24 * 60 * MINUTE_MS;

/// A trailing window over which admitted requests are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    /// The last second
    Second,
    /// The last minute
    Minute,
    /// The last 24 hours
    Day,
}

impl TimeWindow {
    /// All windows in evaluation order. Shorter windows are checked first so
    /// a burst is reported as a per-second violation.
    pub const ALL: [TimeWindow; 3] = [TimeWindow::Second, TimeWindow::Minute, TimeWindow::Day];

    /// Length of the window in milliseconds.
    pub const fn millis(self) -> u64 {
        match self {
            TimeWindow::Second => SECOND_MS,
            TimeWindow::Minute => MINUTE_MS,
            TimeWindow::Day => DAY_MS,
        }
    }

    /// Length of the window.
    pub const fn duration(self) -> Duration {
        Duration::from_millis(self.millis())
    }

    /// Short machine-readable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            TimeWindow::Second => "second",
            TimeWindow::Minute => "minute",
            TimeWindow::Day => "day",
        }
    }

    /// Human-readable rate unit, as used in rejection messages.
    pub const fn description(self) -> &'static str {
        match self {
            TimeWindow::Second => "per second",
            TimeWindow::Minute => "per minute",
            TimeWindow::Day => "per day",
        }
    }

    /// Whether a request recorded at `timestamp` still falls inside this
    /// window as seen from `now`. The window start itself is excluded.
    pub fn contains(self, timestamp: u64, now: u64) -> bool {
        timestamp.saturating_add(self.millis()) > now
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
