/// Performance profiling helpers for tracking per-frame solver timing.
///
/// Provides RAII-style profiling scopes and timing utilities.
use std::time::Instant;
use tracing::trace;

/// A profiling scope that measures elapsed time using RAII.
///
/// Elapsed time is reported at `trace` level when dropped.
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

/// Frame timer tracking the last and mean frame time.
pub struct FrameTimer {
    last_frame_time_ms: f64,
    total_ms: f64,
    frames: u64,
}

impl FrameTimer {
    /// Creates a new frame timer.
    pub fn new() -> Self {
        Self {
            last_frame_time_ms: 0.0,
            total_ms: 0.0,
            frames: 0,
        }
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

    /// Mean over every recorded frame (0 before the first)
    pub fn mean_frame_time_ms(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.total_ms / self.frames as f64
        }
    }

    /// Sum of every recorded frame time.
    pub fn total_ms(&self) -> f64 {
        self.total_ms
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
