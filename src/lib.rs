//! stream-sentry: multi-camera object detection pipeline.
//!
//! Core flow, per camera stream:
//!
//! - Camera threads submit decoded frames to `ObjectDetector::submit_frame`.
//! - `StreamThrottle` samples every Nth frame and drops frames while that
//!   camera already has an inference call in flight.
//! - `InferenceScheduler` bounds concurrent inference globally; frames that
//!   find no free slot are dropped, never queued.
//! - The `InferenceEngine` runs on a detached worker thread; its raw output
//!   goes through confidence/class filtering and per-label NMS
//!   (`PostProcessor`), then zone filtering and the cooldown-debounced
//!   `AlertEngine`.
//! - Qualifying detections become `DetectionEvent`s, recorded in the bounded
//!   `EventHistory`, counted by the `StatisticsAggregator`, and delivered to
//!   registered `PipelineObserver`s.
//!
//! The pipeline favors freshness over completeness: under load it drops
//! frames rather than building queues, so results always describe a recent
//! frame.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod alerts;
pub mod config;
pub mod detect;
pub mod events;
pub mod frame;
pub mod history;
pub mod pipeline;
pub mod scheduler;
pub mod stats;
pub mod throttle;
pub mod zones;

pub use alerts::{AlertDecision, AlertEngine};
pub use config::{AlertMode, AlertPolicy, ClassFilter, PipelineConfig};
pub use detect::{BoundingBox, Detection, InferenceEngine, PostProcessor, StubEngine};
pub use events::{DetectionEvent, ObserverId, PipelineObserver};
pub use frame::Frame;
pub use history::EventHistory;
pub use pipeline::ObjectDetector;
pub use scheduler::InferenceScheduler;
pub use stats::{PipelineStats, StatisticsAggregator};
pub use throttle::{StreamThrottle, ThrottleDecision};
pub use zones::{DetectionZone, ZoneFilter, ZoneMatch};

/// Pipeline error taxonomy.
///
/// `Configuration` and `Export` are returned synchronously from the call that
/// caused them. `Engine` failures happen on worker threads and are delivered
/// asynchronously through `PipelineObserver::on_error`; they never tear down
/// the pipeline, the next sampled frame is the retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineError {
    /// Invalid configuration, zone, or policy; the prior state is retained.
    Configuration(String),
    /// The inference engine failed for one frame.
    Engine { camera_id: String, message: String },
    /// Writing an event export failed.
    Export(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            PipelineError::Engine { camera_id, message } => {
                write!(f, "engine error (camera {}): {}", camera_id, message)
            }
            PipelineError::Export(msg) => write!(f, "export error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Milliseconds since the UNIX epoch. A clock set before the epoch reads 0.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
