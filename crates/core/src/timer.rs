//! Frame timing for the render loop.

use std::time::{Duration, Instant};

/// Longest delta handed to animation and camera updates.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Measures per-frame delta time and a rolling frames-per-second figure.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    frame_count: u64,
    window_start: Instant,
    window_frames: u32,
    fps: f32,
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frame_count: 0,
            window_start: now,
            window_frames: 0,
            fps: 0.0,
        }
    }

    /// Total time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Advances one frame and returns the clamped delta in seconds.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last_tick).min(MAX_FRAME_DELTA);
        self.last_tick = now;
        self.frame_count += 1;
        self.window_frames += 1;

        let window = now.saturating_duration_since(self.window_start);
        if window >= Duration::from_secs(1) {
            self.fps = self.window_frames as f32 / window.as_secs_f32();
            self.window_frames = 0;
            self.window_start = now;
        }

        delta.as_secs_f32()
    }

    /// Frames ticked since creation or the last reset.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second averaged over the last full second, 0 until one has passed.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_is_clamped() {
        let mut timer = FrameTimer::new();
        let later = timer.last_tick + Duration::from_secs(5);
        let delta = timer.tick_at(later);
        assert!((delta - MAX_FRAME_DELTA.as_secs_f32()).abs() < 1e-6);
    }

    #[test]
    fn test_fps_window() {
        let mut timer = FrameTimer::new();
        let base = timer.last_tick;
        for i in 1..=10 {
            timer.tick_at(base + Duration::from_millis(i * 100));
        }
        assert_eq!(timer.frame_count(), 10);
        assert!((timer.fps() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_reset_clears_count() {
        let mut timer = FrameTimer::new();
        timer.tick();
        timer.reset();
        assert_eq!(timer.frame_count(), 0);
        assert_eq!(timer.fps(), 0.0);
    }
}
