//! Running pipeline counters.
//!
//! Updated lock-free from inference workers completing in any order; read via
//! `snapshot()`. A failed engine call leaves the inference counters untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Monotonic counters plus cumulative inference timing.
#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    /// Accepted inference calls that completed successfully.
    frames_processed: AtomicU64,
    /// Sum of post-NMS detections across all calls.
    detections_count: AtomicU64,
    /// Frames dropped by the in-flight gate or global admission.
    frames_dropped: AtomicU64,
    /// Events emitted with `alert_triggered == true`.
    alerts_triggered: AtomicU64,
    /// Cumulative wall-clock inference time, microseconds.
    inference_micros_total: AtomicU64,
}

/// Point-in-time view of the counters, delivered to observers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub detections_count: u64,
    pub frames_dropped: u64,
    pub alerts_triggered: u64,
    /// Cumulative mean wall-clock duration per inference call.
    pub average_inference_ms: f64,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful inference call.
    pub fn record_inference(&self, elapsed: Duration, detections: usize) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.detections_count
            .fetch_add(detections as u64, Ordering::Relaxed);
        self.inference_micros_total
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a frame dropped by throttle or admission control.
    pub fn record_drop(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStats {
        let frames = self.frames_processed.load(Ordering::Relaxed);
        let micros = self.inference_micros_total.load(Ordering::Relaxed);
        let average_inference_ms = if frames == 0 {
            0.0
        } else {
            micros as f64 / frames as f64 / 1000.0
        };
        PipelineStats {
            frames_processed: frames,
            detections_count: self.detections_count.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            alerts_triggered: self.alerts_triggered.load(Ordering::Relaxed),
            average_inference_ms,
        }
    }

    pub fn reset(&self) {
        self.frames_processed.store(0, Ordering::Relaxed);
        self.detections_count.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
        self.alerts_triggered.store(0, Ordering::Relaxed);
        self.inference_micros_total.store(0, Ordering::Relaxed);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
