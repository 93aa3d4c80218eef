//! Pipeline facade.
//!
//! `ObjectDetector` owns per-camera configuration (zones, enablement), wires
//! submitted frames through throttle -> admission -> engine -> post-process ->
//! zones -> alerts -> history/statistics, and surfaces results through the
//! observer registry.
//!
//! Construct one instance per application and pass it to call sites; there is
//! no shared global. Frame submission is fire-and-forget: the submitting
//! camera thread never waits for inference, which runs on a detached worker
//! and reports back through observer callbacks.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use anyhow::{anyhow, Result};

use crate::alerts::AlertEngine;
use crate::config::{AlertPolicy, PipelineConfig, DEFAULT_HISTORY_CAPACITY};
use crate::detect::{Detection, InferenceEngine, PostProcessor};
use crate::events::{DetectionEvent, ObserverId, ObserverRegistry, PipelineObserver};
use crate::frame::Frame;
use crate::history::EventHistory;
use crate::scheduler::{InferenceScheduler, SlotGuard};
use crate::stats::{PipelineStats, StatisticsAggregator};
use crate::throttle::{StreamThrottle, ThrottleDecision};
use crate::zones::{DetectionZone, ZoneFilter, ZoneMatch};
use crate::{now_ms, PipelineError};

struct CameraState {
    camera_name: String,
    enabled: bool,
    throttle: StreamThrottle,
    zones: Vec<DetectionZone>,
}

impl CameraState {
    fn new(camera_name: String) -> Self {
        Self {
            camera_name,
            enabled: true,
            throttle: StreamThrottle::new(),
            zones: Vec::new(),
        }
    }
}

struct PipelineShared {
    engine: Arc<dyn InferenceEngine>,
    config: RwLock<PipelineConfig>,
    scheduler: Arc<InferenceScheduler>,
    alerts: AlertEngine,
    stats: StatisticsAggregator,
    history: EventHistory,
    cameras: RwLock<HashMap<String, Arc<Mutex<CameraState>>>>,
    observers: ObserverRegistry,
    detection_enabled: AtomicBool,
}

/// High-level object detection manager for many camera streams.
pub struct ObjectDetector {
    shared: Arc<PipelineShared>,
}

impl ObjectDetector {
    pub fn new(engine: Arc<dyn InferenceEngine>, config: PipelineConfig) -> Result<Self> {
        Self::with_history_capacity(engine, config, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(
        engine: Arc<dyn InferenceEngine>,
        config: PipelineConfig,
        history_capacity: usize,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PipelineError::Configuration(format!("{e:#}")))?;
        let scheduler = InferenceScheduler::new(config.max_concurrent_streams);
        Ok(Self {
            shared: Arc::new(PipelineShared {
                engine,
                config: RwLock::new(config),
                scheduler,
                alerts: AlertEngine::new(AlertPolicy::default()),
                stats: StatisticsAggregator::new(),
                history: EventHistory::new(history_capacity),
                cameras: RwLock::new(HashMap::new()),
                observers: ObserverRegistry::new(),
                detection_enabled: AtomicBool::new(true),
            }),
        })
    }

    // ------------------------------------------------------------------
    // Model / engine
    // ------------------------------------------------------------------

    pub fn load_model(&self, path: &Path) -> Result<()> {
        self.shared.engine.load_model(path)?;
        log::info!(
            "ObjectDetector: model loaded from {} (engine: {})",
            path.display(),
            self.shared.engine.name()
        );
        Ok(())
    }

    pub fn is_engine_available(&self) -> bool {
        self.shared.engine.is_available()
    }

    // ------------------------------------------------------------------
    // Frame ingress
    // ------------------------------------------------------------------

    /// Submit one frame from a camera. Non-blocking; returns immediately.
    ///
    /// Frames arriving off the sampling phase, while the camera is busy, or
    /// while all admission slots are taken are dropped silently. Drops are
    /// visible only through statistics.
    pub fn submit_frame(&self, camera_id: &str, camera_name: &str, frame: Frame) {
        if !self.shared.detection_enabled.load(Ordering::Acquire) {
            return;
        }

        let camera = self.camera_or_create(camera_id, camera_name);

        // Throttle, admission, and the in-flight transition happen under one
        // camera lock hold so racing submissions cannot double-admit.
        let job = {
            let mut state = camera.lock().expect("camera state lock");
            if !state.enabled {
                return;
            }
            state.camera_name = camera_name.to_string();

            let config = self.shared.config.read().expect("config lock").clone();
            match state.throttle.offer(config.inference_interval) {
                ThrottleDecision::SkippedByInterval => return,
                ThrottleDecision::Busy => {
                    self.shared.stats.record_drop();
                    return;
                }
                ThrottleDecision::Sampled => {}
            }

            let Some(slot) = self.shared.scheduler.try_acquire() else {
                // No free slot: drop the frame, leave the camera idle so a
                // future frame can still be tried.
                self.shared.stats.record_drop();
                return;
            };
            state.throttle.mark_in_flight();

            InferenceJob {
                slot,
                camera_id: camera_id.to_string(),
                camera_name: state.camera_name.clone(),
                zones: state.zones.clone(),
                config,
                frame,
            }
        };

        self.dispatch(job);
    }

    fn camera_or_create(&self, camera_id: &str, camera_name: &str) -> Arc<Mutex<CameraState>> {
        if let Some(camera) = self
            .shared
            .cameras
            .read()
            .expect("camera map lock")
            .get(camera_id)
        {
            return Arc::clone(camera);
        }
        let mut cameras = self.shared.cameras.write().expect("camera map lock");
        Arc::clone(
            cameras
                .entry(camera_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(CameraState::new(camera_name.to_string())))),
        )
    }

    fn dispatch(&self, job: InferenceJob) {
        let shared = Arc::clone(&self.shared);
        let camera_id = job.camera_id.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("infer-{}", camera_id))
            .spawn(move || run_inference(shared, job));
        if let Err(err) = spawned {
            log::error!("ObjectDetector: failed to spawn inference worker: {}", err);
            // The job and its slot guard were dropped with the closure;
            // reopen the camera gate so the stream is not wedged.
            let camera = {
                let cameras = self.shared.cameras.read().expect("camera map lock");
                cameras.get(&camera_id).cloned()
            };
            if let Some(camera) = camera {
                camera
                    .lock()
                    .expect("camera state lock")
                    .throttle
                    .clear_in_flight();
            }
        }
    }

    // ------------------------------------------------------------------
    // Camera lifecycle
    // ------------------------------------------------------------------

    /// Enable detection for a camera, creating its state if needed.
    /// Idempotent.
    pub fn enable_camera(&self, camera_id: &str, camera_name: &str) {
        let camera = self.camera_or_create(camera_id, camera_name);
        let mut state = camera.lock().expect("camera state lock");
        state.enabled = true;
        state.camera_name = camera_name.to_string();
    }

    /// Stop processing for a camera. Idempotent; never blocks on in-flight
    /// work. The camera's zones, sampling phase, and alert state are
    /// destroyed; an inference completing afterwards is a no-op for it.
    pub fn disable_camera(&self, camera_id: &str) {
        let camera = {
            let cameras = self.shared.cameras.read().expect("camera map lock");
            cameras.get(camera_id).cloned()
        };
        if let Some(camera) = camera {
            let mut state = camera.lock().expect("camera state lock");
            state.enabled = false;
            state.zones.clear();
            state.throttle = StreamThrottle::new();
        }
        self.shared.alerts.reset_camera(camera_id);
    }

    /// Stop every known camera and reset global counters.
    pub fn stop_all(&self) {
        self.shared
            .cameras
            .write()
            .expect("camera map lock")
            .clear();
        self.shared.alerts.reset();
        self.shared.stats.reset();
    }

    /// Global kill switch; disables frame intake for all cameras.
    pub fn set_detection_enabled(&self, enabled: bool) {
        self.shared.detection_enabled.store(enabled, Ordering::Release);
    }

    pub fn detection_enabled(&self) -> bool {
        self.shared.detection_enabled.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Configuration surface
    // ------------------------------------------------------------------

    /// Replace the global configuration. Invalid candidates are rejected and
    /// the prior configuration stays active; a valid one takes effect for
    /// subsequently submitted frames only.
    pub fn update_config(&self, config: PipelineConfig) -> Result<()> {
        config
            .validate()
            .map_err(|e| PipelineError::Configuration(format!("{e:#}")))?;
        self.shared
            .scheduler
            .set_limit(config.max_concurrent_streams);
        *self.shared.config.write().expect("config lock") = config;
        Ok(())
    }

    pub fn config(&self) -> PipelineConfig {
        self.shared.config.read().expect("config lock").clone()
    }

    pub fn set_alert_policy(&self, policy: AlertPolicy) {
        self.shared.alerts.set_policy(policy);
    }

    pub fn alert_policy(&self) -> AlertPolicy {
        self.shared.alerts.policy()
    }

    /// Replace a camera's zone list. Every zone is validated first; on any
    /// rejection the camera's existing zones are retained.
    pub fn set_zones(&self, camera_id: &str, zones: Vec<DetectionZone>) -> Result<()> {
        for zone in &zones {
            zone.validate()
                .map_err(|e| PipelineError::Configuration(format!("{e:#}")))?;
        }
        let camera = self.known_camera(camera_id)?;
        camera.lock().expect("camera state lock").zones = zones;
        Ok(())
    }

    pub fn add_zone(&self, camera_id: &str, zone: DetectionZone) -> Result<()> {
        zone.validate()
            .map_err(|e| PipelineError::Configuration(format!("{e:#}")))?;
        let camera = self.known_camera(camera_id)?;
        camera.lock().expect("camera state lock").zones.push(zone);
        Ok(())
    }

    /// Remove a zone by name. Returns true when a zone was removed.
    pub fn remove_zone(&self, camera_id: &str, zone_name: &str) -> Result<bool> {
        let camera = self.known_camera(camera_id)?;
        let mut state = camera.lock().expect("camera state lock");
        let before = state.zones.len();
        state.zones.retain(|zone| zone.name != zone_name);
        Ok(state.zones.len() != before)
    }

    pub fn zones_for_camera(&self, camera_id: &str) -> Option<Vec<DetectionZone>> {
        let cameras = self.shared.cameras.read().expect("camera map lock");
        cameras
            .get(camera_id)
            .map(|camera| camera.lock().expect("camera state lock").zones.clone())
    }

    fn known_camera(&self, camera_id: &str) -> Result<Arc<Mutex<CameraState>>> {
        self.shared
            .cameras
            .read()
            .expect("camera map lock")
            .get(camera_id)
            .cloned()
            .ok_or_else(|| anyhow!("config: unknown camera '{}'", camera_id))
    }

    // ------------------------------------------------------------------
    // History / statistics
    // ------------------------------------------------------------------

    pub fn recent_events(&self, limit: usize) -> Vec<DetectionEvent> {
        self.shared.history.recent(limit)
    }

    pub fn recent_alerts(&self, limit: usize) -> Vec<DetectionEvent> {
        self.shared.history.recent_alerts(limit)
    }

    pub fn statistics(&self) -> PipelineStats {
        self.shared.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.shared.stats.reset();
    }

    pub fn clear_history(&self) {
        self.shared.history.clear();
    }

    /// Export the event history as CSV, oldest to newest.
    pub fn export_events_csv(&self, path: &Path) -> Result<()> {
        self.shared
            .history
            .export_csv(path)
            .map_err(|e| PipelineError::Export(format!("{e:#}")).into())
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn register_observer(&self, observer: Arc<dyn PipelineObserver>) -> ObserverId {
        self.shared.observers.register(observer)
    }

    pub fn unregister_observer(&self, id: ObserverId) {
        self.shared.observers.unregister(id)
    }
}

struct InferenceJob {
    slot: SlotGuard,
    camera_id: String,
    camera_name: String,
    zones: Vec<DetectionZone>,
    config: PipelineConfig,
    frame: Frame,
}

/// Runs on a detached worker thread, one per admitted frame.
fn run_inference(shared: Arc<PipelineShared>, job: InferenceJob) {
    let InferenceJob {
        slot,
        camera_id,
        camera_name,
        zones,
        config,
        frame,
    } = job;

    let started = Instant::now();
    let outcome = shared
        .engine
        .infer(frame.pixels(), frame.width, frame.height);

    // Cancellation: a camera disabled or stopped while this call was in
    // flight makes the completion a no-op. No counters, no events, no
    // observer callbacks; the slot is released on return.
    if !camera_is_active(&shared, &camera_id) {
        return;
    }

    match outcome {
        Err(err) => {
            // Counters stay untouched for a failed call; the next sampled
            // frame is the natural retry.
            let error = PipelineError::Engine {
                camera_id: camera_id.clone(),
                message: format!("{err:#}"),
            };
            log::warn!("inference failed for camera {}: {}", camera_id, error);
            shared.observers.notify_error(&error);
        }
        Ok(raw) => {
            let elapsed = started.elapsed();
            let now = now_ms();
            let raw: Vec<Detection> = raw
                .into_iter()
                .map(|det| {
                    if det.timestamp_ms == 0 {
                        det.with_timestamp(now)
                    } else {
                        det
                    }
                })
                .collect();

            let survivors = PostProcessor::new(
                config.confidence_threshold,
                config.iou_threshold,
                config.enabled_classes.clone(),
            )
            .run(raw);

            // Re-check before recording: the camera may have been disabled
            // while post-processing ran.
            if !camera_is_active(&shared, &camera_id) {
                return;
            }

            shared.stats.record_inference(elapsed, survivors.len());
            shared.observers.notify_detections(&camera_id, &survivors);

            let filter = ZoneFilter::new(&zones);
            for detection in survivors {
                let zone = filter.evaluate(&detection);
                let Some(decision) = shared
                    .alerts
                    .evaluate(&camera_id, &detection.label, &zone, now)
                else {
                    continue;
                };
                if decision.alert_triggered {
                    shared.stats.record_alert();
                }
                let event = DetectionEvent {
                    camera_id: camera_id.clone(),
                    camera_name: camera_name.clone(),
                    detection,
                    timestamp_ms: now,
                    zone_name: match zone {
                        ZoneMatch::Zone(name) => Some(name),
                        _ => None,
                    },
                    alert_triggered: decision.alert_triggered,
                    snapshot: None,
                };
                shared.observers.notify_event(&event);
                shared.history.push(event);
            }

            shared.observers.notify_statistics(&shared.stats.snapshot());
        }
    }

    // Re-open the camera gate. A no-op when the camera was disabled or the
    // pipeline was stopped while this call was in flight.
    let camera = {
        let cameras = shared.cameras.read().expect("camera map lock");
        cameras.get(&camera_id).cloned()
    };
    if let Some(camera) = camera {
        camera
            .lock()
            .expect("camera state lock")
            .throttle
            .clear_in_flight();
    }

    drop(slot);
}

/// True when the camera still exists and is enabled.
fn camera_is_active(shared: &PipelineShared, camera_id: &str) -> bool {
    let cameras = shared.cameras.read().expect("camera map lock");
    match cameras.get(camera_id) {
        Some(camera) => camera.lock().expect("camera state lock").enabled,
        None => false,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassFilter;
    use crate::detect::{BoundingBox, StubEngine};
    use std::time::Duration;

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            inference_interval: 1,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            enabled_classes: ClassFilter::All,
            ..Default::default()
        }
    }

    fn wait_for<F: Fn() -> bool>(cond: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            if Instant::now() > deadline {
                panic!("condition not reached within timeout");
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn rejects_invalid_construction_config() {
        let engine = Arc::new(StubEngine::new());
        let config = PipelineConfig {
            max_concurrent_streams: 0,
            ..Default::default()
        };
        assert!(ObjectDetector::new(engine, config).is_err());
    }

    #[test]
    fn invalid_config_update_retains_prior_config() {
        let detector =
            ObjectDetector::new(Arc::new(StubEngine::new()), fast_config()).unwrap();
        let prior = detector.config();

        let bad = PipelineConfig {
            confidence_threshold: 2.0,
            ..prior.clone()
        };
        assert!(detector.update_config(bad).is_err());
        assert_eq!(detector.config(), prior);
    }

    #[test]
    fn submitted_frame_flows_to_history() {
        let engine = Arc::new(StubEngine::new().with_script(vec![vec![Detection::new(
            "person",
            0.9,
            BoundingBox::new(0.1, 0.1, 0.2, 0.2),
        )]]));
        let detector = ObjectDetector::new(engine, fast_config()).unwrap();

        detector.submit_frame("front-door", "Front Door", Frame::synthetic(32, 32, 0));
        wait_for(|| detector.statistics().frames_processed == 1);

        let events = detector.recent_events(10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].camera_id, "front-door");
        assert!(events[0].alert_triggered);
        assert_eq!(detector.statistics().detections_count, 1);
    }

    #[test]
    fn disabled_camera_ignores_frames() {
        let engine = Arc::new(StubEngine::new());
        let detector = ObjectDetector::new(engine, fast_config()).unwrap();

        detector.enable_camera("cam", "Camera");
        detector.disable_camera("cam");
        detector.disable_camera("cam"); // idempotent

        detector.submit_frame("cam", "Camera", Frame::synthetic(32, 32, 0));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(detector.statistics().frames_processed, 0);
    }

    #[test]
    fn global_kill_switch_stops_intake() {
        let detector =
            ObjectDetector::new(Arc::new(StubEngine::new()), fast_config()).unwrap();
        detector.set_detection_enabled(false);
        detector.submit_frame("cam", "Camera", Frame::synthetic(32, 32, 0));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(detector.statistics().frames_processed, 0);
        assert!(!detector.detection_enabled());
    }

    #[test]
    fn zone_crud_requires_known_camera() {
        let detector =
            ObjectDetector::new(Arc::new(StubEngine::new()), fast_config()).unwrap();

        let zone = DetectionZone::new("porch", BoundingBox::new(0.0, 0.0, 0.5, 0.5));
        assert!(detector.set_zones("ghost", vec![zone.clone()]).is_err());

        detector.enable_camera("cam", "Camera");
        detector.set_zones("cam", vec![zone.clone()]).unwrap();
        assert_eq!(detector.zones_for_camera("cam").unwrap().len(), 1);

        detector
            .add_zone(
                "cam",
                DetectionZone::new("drive", BoundingBox::new(0.5, 0.5, 0.4, 0.4)),
            )
            .unwrap();
        assert_eq!(detector.zones_for_camera("cam").unwrap().len(), 2);

        assert!(detector.remove_zone("cam", "porch").unwrap());
        assert!(!detector.remove_zone("cam", "porch").unwrap());
    }

    #[test]
    fn invalid_zone_is_rejected_and_existing_zones_kept() {
        let detector =
            ObjectDetector::new(Arc::new(StubEngine::new()), fast_config()).unwrap();
        detector.enable_camera("cam", "Camera");
        detector
            .set_zones(
                "cam",
                vec![DetectionZone::new("porch", BoundingBox::new(0.0, 0.0, 0.5, 0.5))],
            )
            .unwrap();

        let bad = DetectionZone::new("oversize", BoundingBox::new(0.9, 0.9, 0.5, 0.5));
        assert!(detector.set_zones("cam", vec![bad]).is_err());
        assert_eq!(detector.zones_for_camera("cam").unwrap().len(), 1);
    }

    #[test]
    fn stop_all_clears_cameras_and_counters() {
        let engine = Arc::new(StubEngine::new().with_script(vec![vec![Detection::new(
            "person",
            0.9,
            BoundingBox::new(0.1, 0.1, 0.2, 0.2),
        )]]));
        let detector = ObjectDetector::new(engine, fast_config()).unwrap();

        detector.submit_frame("cam", "Camera", Frame::synthetic(32, 32, 0));
        wait_for(|| detector.statistics().frames_processed == 1);

        detector.stop_all();
        assert_eq!(detector.statistics(), PipelineStats::default());
        assert!(detector.zones_for_camera("cam").is_none());
    }
}
