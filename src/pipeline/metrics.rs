// src/pipeline/metrics.rs
//
// Observability for the frame loop. Counters are atomics so parallel
// steps can bump them without locking; timings hold the latest frame's
// phase durations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub foreground_pixels: Arc<AtomicU64>,
    pub shadow_pixels: Arc<AtomicU64>,
    pub maintenance_time_us: Arc<AtomicU64>,
    pub shadow_time_us: Arc<AtomicU64>,
    pub extraction_time_us: Arc<AtomicU64>,
    pub regulation_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            foreground_pixels: Arc::new(AtomicU64::new(0)),
            shadow_pixels: Arc::new(AtomicU64::new(0)),
            maintenance_time_us: Arc::new(AtomicU64::new(0)),
            shadow_time_us: Arc::new(AtomicU64::new(0)),
            extraction_time_us: Arc::new(AtomicU64::new(0)),
            regulation_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn add(&self, counter: &AtomicU64, amount: u64) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            foreground_pixels: self.foreground_pixels.load(Ordering::Relaxed),
            shadow_pixels: self.shadow_pixels.load(Ordering::Relaxed),
            last_maintenance_us: self.maintenance_time_us.load(Ordering::Relaxed),
            last_shadow_us: self.shadow_time_us.load(Ordering::Relaxed),
            last_extraction_us: self.extraction_time_us.load(Ordering::Relaxed),
            last_regulation_us: self.regulation_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub foreground_pixels: u64,
    pub shadow_pixels: u64,
    pub last_maintenance_us: u64,
    pub last_shadow_us: u64,
    pub last_extraction_us: u64,
    pub last_regulation_us: u64,
    pub elapsed_secs: f64,
}
