// SPDX-License-Identifier: GPL-3.0-only

//! Rolling throughput measurement
//!
//! Both the processing stage and the display loop keep their own window of
//! recent event timestamps and report events per second over it.

use crate::constants::FPS_WINDOW;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Time-ordered list of recent event timestamps, trimmed by age
#[derive(Debug, Clone)]
pub struct FpsWindow {
    window: Duration,
    timestamps: VecDeque<Instant>,
    last_fps: f32,
}

impl Default for FpsWindow {
    fn default() -> Self {
        Self::new(FPS_WINDOW)
    }
}

impl FpsWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timestamps: VecDeque::new(),
            last_fps: 0.0,
        }
    }

    /// Record an event at `now` and return the updated rate
    ///
    /// Timestamps older than the window (relative to `now`) are dropped first.
    /// With fewer than two events in the window the rate is 0.
    pub fn record(&mut self, now: Instant) -> f32 {
        self.timestamps.push_back(now);
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        self.last_fps = match (self.timestamps.front(), self.timestamps.back()) {
            (Some(first), Some(last)) if self.timestamps.len() > 1 => {
                // Clamp to 1ms so a burst of identical timestamps can't divide by zero
                let span = last
                    .saturating_duration_since(*first)
                    .max(Duration::from_millis(1));
                (self.timestamps.len() - 1) as f32 / span.as_secs_f32()
            }
            _ => 0.0,
        };
        self.last_fps
    }

    /// Rate computed by the most recent `record` call
    pub fn fps(&self) -> f32 {
        self.last_fps
    }

    /// Number of events currently inside the window
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
        self.last_fps = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event_reports_zero() {
        let mut window = FpsWindow::default();
        assert_eq!(window.record(Instant::now()), 0.0);
    }

    #[test]
    fn test_steady_100ms_events_report_10_fps() {
        let mut window = FpsWindow::default();
        let start = Instant::now();
        let mut fps = 0.0;
        for i in 0..30 {
            fps = window.record(start + Duration::from_millis(100 * i));
        }
        assert!((fps - 10.0).abs() < 0.01, "expected ~10 fps, got {}", fps);
        // 1000ms window with events every 100ms keeps both endpoints
        assert_eq!(window.len(), 11);
    }

    #[test]
    fn test_old_events_are_trimmed() {
        let mut window = FpsWindow::default();
        let start = Instant::now();
        window.record(start);
        window.record(start + Duration::from_millis(50));
        let fps = window.record(start + Duration::from_secs(5));
        assert_eq!(window.len(), 1);
        assert_eq!(fps, 0.0);
    }

    #[test]
    fn test_identical_timestamps_do_not_divide_by_zero() {
        let mut window = FpsWindow::default();
        let now = Instant::now();
        window.record(now);
        let fps = window.record(now);
        assert!(fps.is_finite());
        assert!((fps - 1000.0).abs() < 0.01);
    }
}
