//! Performance monitoring
//!
//! Rolling frame rate for the status bar, plus how long the last preview
//! rasterization took.

use std::collections::VecDeque;
use std::time::Duration;

/// Fixed-size window of durations
#[derive(Debug, Clone)]
struct Window {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    fn mean_ms(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total.as_secs_f32() * 1000.0 / self.samples.len() as f32)
    }
}

#[derive(Debug, Clone)]
pub struct PerfMetrics {
    frames: Window,
    last_raster: Option<Duration>,
}

impl PerfMetrics {
    const FRAME_SAMPLES: usize = 60;

    pub fn new() -> Self {
        Self {
            frames: Window::new(Self::FRAME_SAMPLES),
            last_raster: None,
        }
    }

    pub fn record_frame(&mut self, duration: Duration) {
        self.frames.push(duration);
    }

    pub fn record_raster(&mut self, duration: Duration) {
        self.last_raster = Some(duration);
    }

    pub fn fps(&self) -> f32 {
        match self.frames.mean_ms() {
            Some(ms) if ms > 0.0 => 1000.0 / ms,
            _ => 0.0,
        }
    }

    pub fn fps_int(&self) -> u32 {
        self.fps().round() as u32
    }

    /// Milliseconds spent on the most recent preview raster, if any.
    pub fn raster_ms(&self) -> Option<u64> {
        self.last_raster.map(|d| d.as_millis() as u64)
    }

    /// Below 30 FPS
    pub fn is_degraded(&self) -> bool {
        let fps = self.fps();
        fps > 0.0 && fps < 30.0
    }
}

impl Default for PerfMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metrics() {
        let metrics = PerfMetrics::new();
        assert_eq!(metrics.fps(), 0.0);
        assert_eq!(metrics.raster_ms(), None);
        assert!(!metrics.is_degraded());
    }

    #[test]
    fn test_steady_frames() {
        let mut metrics = PerfMetrics::new();
        for _ in 0..120 {
            metrics.record_frame(Duration::from_millis(16));
        }
        assert!(metrics.fps_int() >= 60 && metrics.fps_int() <= 65);
        assert!(!metrics.is_degraded());
    }

    #[test]
    fn test_window_forgets_old_frames() {
        let mut metrics = PerfMetrics::new();
        for _ in 0..60 {
            metrics.record_frame(Duration::from_millis(100));
        }
        assert!(metrics.is_degraded());
        for _ in 0..60 {
            metrics.record_frame(Duration::from_millis(10));
        }
        assert!(!metrics.is_degraded());
    }

    #[test]
    fn test_raster_time() {
        let mut metrics = PerfMetrics::new();
        metrics.record_raster(Duration::from_millis(42));
        assert_eq!(metrics.raster_ms(), Some(42));
    }
}
