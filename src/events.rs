//! Detection events and observer egress.
//!
//! Observers are an explicit subscription surface: `register` returns an id,
//! and callers unregister before teardown. The registry holds `Arc` handles
//! only; there is no implicit lifetime coupling between the pipeline and its
//! subscribers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::stats::PipelineStats;
use crate::PipelineError;

/// One qualifying detection, as recorded in history and delivered to
/// observers. Immutable after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub camera_id: String,
    pub camera_name: String,
    pub detection: Detection,
    /// Milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,
    /// Zone that matched, when the camera has zones configured.
    pub zone_name: Option<String>,
    /// True when this event fired an alert (cooldown was open).
    pub alert_triggered: bool,
    /// Opaque reference to a snapshot captured by an outer collaborator.
    pub snapshot: Option<String>,
}

/// Subscriber interface for pipeline egress.
///
/// Callbacks run on inference worker threads; implementations should hand off
/// quickly rather than block the worker.
pub trait PipelineObserver: Send + Sync {
    /// Post-NMS detections for one inference call.
    fn on_detections(&self, _camera_id: &str, _detections: &[Detection]) {}

    /// A qualifying detection produced an event.
    fn on_event(&self, _event: &DetectionEvent) {}

    /// Counters updated after an inference call completed.
    fn on_statistics(&self, _stats: &PipelineStats) {}

    /// A non-fatal pipeline error (engine failures, mostly).
    fn on_error(&self, _error: &PipelineError) {}
}

/// Handle returned by `register`; pass back to `unregister`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Thread-safe list of subscribers.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<(ObserverId, Arc<dyn PipelineObserver>)>>,
    next_id: AtomicU64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn PipelineObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .expect("observer registry lock")
            .push((id, observer));
        id
    }

    /// Remove a subscriber. Idempotent.
    pub fn unregister(&self, id: ObserverId) {
        self.observers
            .write()
            .expect("observer registry lock")
            .retain(|(entry_id, _)| *entry_id != id);
    }

    pub fn notify_detections(&self, camera_id: &str, detections: &[Detection]) {
        for observer in self.current() {
            observer.on_detections(camera_id, detections);
        }
    }

    pub fn notify_event(&self, event: &DetectionEvent) {
        for observer in self.current() {
            observer.on_event(event);
        }
    }

    pub fn notify_statistics(&self, stats: &PipelineStats) {
        for observer in self.current() {
            observer.on_statistics(stats);
        }
    }

    pub fn notify_error(&self, error: &PipelineError) {
        for observer in self.current() {
            observer.on_error(error);
        }
    }

    // Snapshot the list so callbacks run without holding the lock.
    fn current(&self) -> Vec<Arc<dyn PipelineObserver>> {
        self.observers
            .read()
            .expect("observer registry lock")
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
