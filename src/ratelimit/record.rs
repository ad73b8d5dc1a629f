//! Per-client request history.

use std::collections::VecDeque;

use super::window::TimeWindow;

/// Arrival times of the admitted requests of one client, oldest first,
/// limited to the trailing day.
#[derive(Debug, Default, Clone)]
pub struct ClientRecord {
    timestamps: VecDeque<u64>,
}

impl ClientRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp that has left the day window.
    pub fn prune(&mut self, now: u64) {
        while let Some(&oldest) = self.timestamps.front() {
            if TimeWindow::Day.contains(oldest, now) {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    /// Record an admitted request.
    ///
    /// If the wall clock has stepped backwards, `now` is raised to the last
    /// recorded timestamp so the sequence stays ordered. Until the clock
    /// catches up, those entries sit in the future and hold the client back
    /// for longer than the window itself (a 1s window can report a retry
    /// after 6s following a 5s step back).
    pub fn push(&mut self, now: u64) {
        let at = self.timestamps.back().map_or(now, |&last| last.max(now));
        self.timestamps.push_back(at);
    }

    /// Number of recorded requests inside `window`.
    pub fn count_within(&self, window: TimeWindow, now: u64) -> u64 {
        (self.timestamps.len() - self.first_within(window, now)) as u64
    }

    /// The oldest recorded request still inside `window`, if any.
    pub fn oldest_within(&self, window: TimeWindow, now: u64) -> Option<u64> {
        self.timestamps.get(self.first_within(window, now)).copied()
    }

    /// Number of recorded requests.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether no requests are recorded.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn first_within(&self, window: TimeWindow, now: u64) -> usize {
        self.timestamps
            .partition_point(|&timestamp| !window.contains(timestamp, now))
    }
}
