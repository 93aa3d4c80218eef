//! Pipeline configuration.
//!
//! `PipelineConfig` is global and read by every stage. It is replaced only
//! through `ObjectDetector::update_config`, which validates the candidate
//! configuration before swapping it in; an invalid candidate is rejected and
//! the prior configuration stays active. Updates take effect for subsequently
//! submitted frames, never retroactively for in-flight work.
//!
//! Configuration is resolved in three layers, last writer wins:
//! defaults -> optional JSON config file (`SENTRY_CONFIG`) -> environment
//! variables.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENT_STREAMS: usize = 4;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_INFERENCE_INTERVAL: u64 = 3;
pub const DEFAULT_COOLDOWN_SECS: u64 = 30;
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Class allowlist with an explicit absent state.
///
/// `All` means "no filter configured"; `Only` with an empty set means
/// "nothing is allowed". The two are deliberately distinct so an empty-but-
/// present list cannot be misread as "everything".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassFilter {
    #[default]
    All,
    Only(HashSet<String>),
}

impl ClassFilter {
    pub fn only<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(labels.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, label: &str) -> bool {
        match self {
            ClassFilter::All => true,
            ClassFilter::Only(set) => set.contains(label),
        }
    }
}

/// Global pipeline configuration.
///
/// Defaults match the original deployment profile: GPU on, four concurrent
/// streams, 0.5 confidence, 0.45 IoU, every third frame sampled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Prefer GPU execution when the engine supports it.
    pub use_gpu: bool,
    /// Upper bound on inference calls in flight across all cameras.
    pub max_concurrent_streams: usize,
    /// Minimum confidence for a detection to survive post-processing.
    pub confidence_threshold: f32,
    /// IoU at or above which same-label detections are suppressed.
    pub iou_threshold: f32,
    /// Process every Nth frame per camera.
    pub inference_interval: u64,
    /// Global class filter applied before NMS.
    pub enabled_classes: ClassFilter,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_gpu: true,
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            inference_interval: DEFAULT_INFERENCE_INTERVAL,
            enabled_classes: ClassFilter::All,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the optional `SENTRY_CONFIG` JSON file and
    /// environment overrides, then validate.
    pub fn load() -> Result<Self> {
        let file_cfg = match std::env::var("SENTRY_CONFIG").ok().as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            use_gpu: file.use_gpu.unwrap_or(defaults.use_gpu),
            max_concurrent_streams: file
                .max_concurrent_streams
                .unwrap_or(defaults.max_concurrent_streams),
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            iou_threshold: file.iou_threshold.unwrap_or(defaults.iou_threshold),
            inference_interval: file
                .inference_interval
                .unwrap_or(defaults.inference_interval),
            enabled_classes: match file.enabled_classes {
                Some(labels) => ClassFilter::only(labels),
                None => ClassFilter::All,
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(streams) = std::env::var("SENTRY_MAX_STREAMS") {
            self.max_concurrent_streams = streams
                .parse()
                .map_err(|_| anyhow!("SENTRY_MAX_STREAMS must be an integer"))?;
        }
        if let Ok(conf) = std::env::var("SENTRY_CONFIDENCE") {
            self.confidence_threshold = conf
                .parse()
                .map_err(|_| anyhow!("SENTRY_CONFIDENCE must be a float"))?;
        }
        if let Ok(iou) = std::env::var("SENTRY_IOU") {
            self.iou_threshold = iou
                .parse()
                .map_err(|_| anyhow!("SENTRY_IOU must be a float"))?;
        }
        if let Ok(interval) = std::env::var("SENTRY_INTERVAL") {
            self.inference_interval = interval
                .parse()
                .map_err(|_| anyhow!("SENTRY_INTERVAL must be an integer"))?;
        }
        if let Ok(classes) = std::env::var("SENTRY_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.enabled_classes = ClassFilter::only(parsed);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_streams == 0 {
            return Err(anyhow!("config: max_concurrent_streams must be >= 1"));
        }
        if self.inference_interval == 0 {
            return Err(anyhow!("config: inference_interval must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!("config: confidence_threshold out of [0,1]"));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(anyhow!("config: iou_threshold out of [0,1]"));
        }
        Ok(())
    }
}

/// Alert policy applied by the AlertEngine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub mode: AlertMode,
    /// Labels that qualify under `AlertMode::Specific`.
    ///
    /// An empty `Only` set under `Specific` means nothing ever qualifies;
    /// that is an explicit configuration, not an error.
    pub alert_classes: ClassFilter,
    /// Minimum interval between `alert_triggered` events for one alert key.
    pub cooldown: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            mode: AlertMode::Any,
            alert_classes: ClassFilter::All,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
        }
    }
}

/// Which detections qualify for alert evaluation at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMode {
    /// No events are produced.
    Disabled,
    /// Every surviving, zone-passed detection qualifies.
    #[default]
    Any,
    /// Only labels in `alert_classes` qualify.
    Specific,
    /// Only detections that matched an enabled zone qualify.
    Zone,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineConfigFile {
    use_gpu: Option<bool>,
    max_concurrent_streams: Option<usize>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    inference_interval: Option<u64>,
    enabled_classes: Option<Vec<String>>,
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_streams_rejected() {
        let cfg = PipelineConfig {
            max_concurrent_streams: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let cfg = PipelineConfig {
            inference_interval: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn thresholds_must_be_in_unit_range() {
        let cfg = PipelineConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = PipelineConfig {
            iou_threshold: -0.1,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn class_filter_distinguishes_absent_from_empty() {
        let all = ClassFilter::All;
        let none = ClassFilter::only(Vec::<String>::new());

        assert!(all.allows("person"));
        assert!(!none.allows("person"));
    }

    #[test]
    fn class_filter_only_matches_listed_labels() {
        let filter = ClassFilter::only(["person", "car"]);
        assert!(filter.allows("person"));
        assert!(!filter.allows("dog"));
    }

    #[test]
    fn config_file_fields_override_defaults() {
        let file = PipelineConfigFile {
            max_concurrent_streams: Some(2),
            confidence_threshold: Some(0.7),
            ..Default::default()
        };
        let cfg = PipelineConfig::from_file(file);
        assert_eq!(cfg.max_concurrent_streams, 2);
        assert_eq!(cfg.confidence_threshold, 0.7);
        assert_eq!(cfg.inference_interval, DEFAULT_INFERENCE_INTERVAL);
    }
}
