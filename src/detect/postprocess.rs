//! Raw-output post-processing: confidence thresholding, class filtering, and
//! per-label non-max suppression.
//!
//! NMS collapses duplicate boxes for one physical object. It runs per label
//! group so cross-class overlaps (a person inside a vehicle) are never
//! suppressed against each other.

use std::collections::HashMap;

use crate::config::ClassFilter;
use crate::detect::result::Detection;

/// Confidence filter + NMS over one inference call's raw output.
pub struct PostProcessor {
    confidence_threshold: f32,
    iou_threshold: f32,
    enabled_classes: ClassFilter,
}

impl PostProcessor {
    pub fn new(
        confidence_threshold: f32,
        iou_threshold: f32,
        enabled_classes: ClassFilter,
    ) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            enabled_classes,
        }
    }

    /// Filter and deduplicate raw detections.
    ///
    /// 1. Drop detections below the confidence threshold.
    /// 2. Drop detections whose label the class filter rejects.
    /// 3. Within each label group, sorted descending by confidence, greedily
    ///    keep a detection unless its IoU with an already-kept detection of
    ///    the same label reaches the IoU threshold.
    ///
    /// Output order is confidence-descending within each label group.
    pub fn run(&self, raw: Vec<Detection>) -> Vec<Detection> {
        let mut groups: HashMap<String, Vec<Detection>> = HashMap::new();
        for det in raw {
            if det.confidence < self.confidence_threshold {
                continue;
            }
            if !self.enabled_classes.allows(&det.label) {
                continue;
            }
            groups.entry(det.label.clone()).or_default().push(det);
        }

        let mut survivors = Vec::new();
        for (_, mut group) in groups {
            group.sort_by(|a, b| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut kept: Vec<Detection> = Vec::new();
            for candidate in group {
                let suppressed = kept
                    .iter()
                    .any(|k| k.bbox.iou(&candidate.bbox) >= self.iou_threshold);
                if !suppressed {
                    kept.push(candidate);
                }
            }
            survivors.extend(kept);
        }

        survivors
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
