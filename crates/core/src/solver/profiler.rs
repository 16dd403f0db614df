//! Performance profiling helpers for tracking step timing.
//!
//! Provides RAII-style profiling scopes and timing utilities.

use std::time::Instant;
use tracing::trace;

/// A profiling scope that measures elapsed time using RAII.
///
/// The elapsed time is logged at `trace` level when the scope is dropped.
pub struct ProfilerScope {
    start: Instant,
    name: &'static str,
}

impl ProfilerScope {
    /// Creates a new profiling scope.
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
        }
    }

    /// Gets elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for ProfilerScope {
    fn drop(&mut self) {
        trace!("{} took {:.3} ms", self.name, self.elapsed_ms());
    }
}

/// Simple frame timer for tracking step performance.
#[derive(Debug, Clone, Default)]
pub struct FrameTimer {
    last_frame_time_ms: f64,
    total_ms: f64,
    frames: u64,
}

impl FrameTimer {
    /// Creates a new frame timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records frame time in milliseconds.
    pub fn record(&mut self, time_ms: f64) {
        self.last_frame_time_ms = time_ms;
        self.total_ms += time_ms;
        self.frames += 1;
    }

    /// Gets the last recorded frame time.
    pub fn last_frame_time_ms(&self) -> f64 {
        self.last_frame_time_ms
    }

    /// Mean frame time over every recorded frame, 0 before the first one.
    pub fn average_frame_time_ms(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.total_ms / self.frames as f64
        }
    }
}
