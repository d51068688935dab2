//! Smoothed frames-per-second measurement.
//!
//! The meter recomputes its rate once per fixed window instead of per frame,
//! so the displayed value does not jitter with per-frame timing noise. The
//! returned rate may be stale by up to one window; that staleness is the
//! smoothing.

use std::time::{Duration, Instant};

/// Interval over which the rate is recomputed.
pub const RATE_WINDOW: Duration = Duration::from_millis(500);

/// Windowed frame-rate meter.
///
/// Before the first window closes the rate is 0.0; callers render "0" rather
/// than treating it as an error.
pub struct RateMeter {
    frame_count: u32,
    window_start: Instant,
    rate: f32,
}

impl RateMeter {
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            window_start: Instant::now(),
            rate: 0.0,
        }
    }

    /// Record one frame and return the current smoothed rate.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// Clock-injected tick, used by tests to drive window boundaries
    /// deterministically.
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        self.frame_count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= RATE_WINDOW {
            self.rate = self.frame_count as f32 / elapsed.as_secs_f32();
            self.frame_count = 0;
            self.window_start = now;
        }
        self.rate
    }

    /// Latest computed rate without recording a frame.
    pub fn rate(&self) -> f32 {
        self.rate
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}
