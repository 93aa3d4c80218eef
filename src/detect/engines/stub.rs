use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::engine::InferenceEngine;
use crate::detect::result::Detection;

/// Scripted engine for tests and the demo binary.
///
/// Pops one pre-queued detection list per `infer` call; once the script is
/// exhausted every call returns an empty list. An optional artificial latency
/// makes scheduler behavior observable in tests.
pub struct StubEngine {
    script: Mutex<VecDeque<Vec<Detection>>>,
    latency: Option<Duration>,
    available: AtomicBool,
}

impl StubEngine {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            latency: None,
            // Mirrors a real backend: nothing is served until a model loads.
            available: AtomicBool::new(false),
        }
    }

    /// Queue detection lists to be returned by subsequent `infer` calls.
    pub fn with_script<I>(self, script: I) -> Self
    where
        I: IntoIterator<Item = Vec<Detection>>,
    {
        {
            let mut guard = self.script.lock().expect("stub script lock");
            guard.extend(script);
        }
        self
    }

    /// Sleep this long inside each `infer` call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_result(&self, detections: Vec<Detection>) {
        self.script
            .lock()
            .expect("stub script lock")
            .push_back(detections);
    }
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceEngine for StubEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn load_model(&self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(anyhow!("stub engine: empty model path"));
        }
        self.available.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn infer(&self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        let next = self
            .script
            .lock()
            .expect("stub script lock")
            .pop_front()
            .unwrap_or_default();
        Ok(next)
    }
}
