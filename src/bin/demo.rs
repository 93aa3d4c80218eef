//! demo - end-to-end synthetic run for the stream-sentry pipeline

use anyhow::{anyhow, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stream_sentry::{
    AlertMode, AlertPolicy, BoundingBox, ClassFilter, Detection, DetectionEvent, DetectionZone,
    Frame, InferenceEngine, ObjectDetector, PipelineConfig, PipelineError, PipelineObserver,
    StubEngine,
};

const DEMO_LABELS: &[&str] = &["person", "car", "dog", "bicycle"];

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Duration in seconds for synthetic frames.
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    /// Frames per second per synthetic camera.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Number of synthetic cameras.
    #[arg(long, default_value_t = 3)]
    cameras: u32,
    /// Output directory for the CSV event export.
    #[arg(long, default_value = "demo_out")]
    out: String,
    /// Optional deterministic seed for synthetic detections.
    #[arg(long)]
    seed: Option<u64>,
}

struct ConsoleObserver;

impl PipelineObserver for ConsoleObserver {
    fn on_event(&self, event: &DetectionEvent) {
        if event.alert_triggered {
            eprintln!(
                "demo: ALERT {} ({:.0}%) on {}{}",
                event.detection.label,
                event.detection.confidence * 100.0,
                event.camera_name,
                event
                    .zone_name
                    .as_deref()
                    .map(|z| format!(" in zone '{}'", z))
                    .unwrap_or_default(),
            );
        }
    }

    fn on_error(&self, error: &PipelineError) {
        eprintln!("demo: pipeline error: {}", error);
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.fps == 0 || args.cameras == 0 {
        return Err(anyhow!("fps and cameras must be >= 1"));
    }

    let out_dir = PathBuf::from(&args.out);
    fs::create_dir_all(&out_dir)?;
    let export_path = out_dir.join("events.csv");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    stage("configure pipeline");
    let config = PipelineConfig::load()?;
    let engine = Arc::new(StubEngine::new());
    let detector = ObjectDetector::new(
        Arc::clone(&engine) as Arc<dyn InferenceEngine>,
        config.clone(),
    )?;
    detector.register_observer(Arc::new(ConsoleObserver));

    // Short cooldown so a few-second run shows the debounce working.
    detector.set_alert_policy(AlertPolicy {
        mode: AlertMode::Any,
        alert_classes: ClassFilter::All,
        cooldown: Duration::from_secs(2),
    });

    // First camera gets a zone covering its left half.
    detector.enable_camera("cam-0", "Camera 0");
    detector.set_zones(
        "cam-0",
        vec![DetectionZone::new(
            "left half",
            BoundingBox::new(0.0, 0.0, 0.5, 1.0),
        )],
    )?;

    stage("generate synthetic frames");
    let mut rng = StdRng::seed_from_u64(args.seed.unwrap_or(0));
    let total_ticks = args.seconds.saturating_mul(args.fps as u64);
    let tick = Duration::from_secs_f64(1.0 / args.fps as f64);
    let mut frames_submitted = 0u64;

    for n in 0..total_ticks {
        if !running.load(Ordering::SeqCst) {
            eprintln!("demo: interrupted, stopping early");
            break;
        }
        for cam in 0..args.cameras {
            // Roughly one candidate object per second per camera.
            if rng.gen_bool(1.0 / args.fps as f64) {
                let label = DEMO_LABELS[rng.gen_range(0..DEMO_LABELS.len())];
                let confidence = rng.gen_range(0.3..0.99);
                let x = rng.gen_range(0.0..0.8);
                let y = rng.gen_range(0.0..0.8);
                engine.push_result(vec![Detection::new(
                    label,
                    confidence,
                    BoundingBox::new(x, y, 0.2, 0.2),
                )]);
            }
            let camera_id = format!("cam-{}", cam);
            let camera_name = format!("Camera {}", cam);
            detector.submit_frame(&camera_id, &camera_name, Frame::synthetic(320, 240, n));
            frames_submitted += 1;
        }
        std::thread::sleep(tick);
    }

    // Give in-flight workers a moment to finish before exporting.
    std::thread::sleep(Duration::from_millis(200));

    stage("export event history");
    detector.export_events_csv(&export_path)?;

    let stats = detector.statistics();
    println!("demo summary:");
    println!("  frames submitted: {}", frames_submitted);
    println!("  frames processed: {}", stats.frames_processed);
    println!("  frames dropped: {}", stats.frames_dropped);
    println!("  detections: {}", stats.detections_count);
    println!("  alerts triggered: {}", stats.alerts_triggered);
    println!("  avg inference: {:.2} ms", stats.average_inference_ms);
    println!("  event export: {}", export_path.display());
    println!("next steps:");
    println!("  head {}", export_path.display());
    println!("  SENTRY_INTERVAL=1 cargo run --bin demo -- --seconds 10");

    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}
