//! Detection zones and zone filtering.
//!
//! A zone is a user-defined spatial region of a camera's frame, with an
//! optional per-zone class allowlist. Zones are owned by the per-camera
//! configuration; the pipeline only reads them.
//!
//! Containment uses the center point of a detection's bounding box. When a
//! detection's center falls inside several enabled zones, the first enabled
//! zone in configured order wins.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::config::ClassFilter;
use crate::detect::{BoundingBox, Detection};

/// Named spatial region with an optional class allowlist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionZone {
    pub name: String,
    /// Zone rect in normalized coordinates.
    pub rect: BoundingBox,
    pub enabled: bool,
    /// Classes this zone accepts; `All` when unset.
    pub allowed_classes: ClassFilter,
}

impl DetectionZone {
    pub fn new(name: impl Into<String>, rect: BoundingBox) -> Self {
        Self {
            name: name.into(),
            rect,
            enabled: true,
            allowed_classes: ClassFilter::All,
        }
    }

    pub fn with_allowed_classes(mut self, filter: ClassFilter) -> Self {
        self.allowed_classes = filter;
        self
    }

    /// Validate name and geometry. Rejected zones never reach camera state.
    pub fn validate(&self) -> Result<()> {
        validate_zone_name(&self.name)?;
        let r = &self.rect;
        if !(0.0..=1.0).contains(&r.x)
            || !(0.0..=1.0).contains(&r.y)
            || r.w <= 0.0
            || r.h <= 0.0
            || r.x + r.w > 1.0 + f32::EPSILON
            || r.y + r.h > 1.0 + f32::EPSILON
        {
            return Err(anyhow!(
                "config: zone '{}' rect out of normalized bounds",
                self.name
            ));
        }
        Ok(())
    }

    /// True when the detection's bbox center lies inside this zone and the
    /// zone's class filter accepts the label. Disabled zones match nothing.
    pub fn matches(&self, detection: &Detection) -> bool {
        if !self.enabled {
            return false;
        }
        let (cx, cy) = detection.bbox.center();
        self.rect.contains_point(cx, cy) && self.allowed_classes.allows(&detection.label)
    }
}

/// Zone names are short local identifiers, not free text.
pub fn validate_zone_name(name: &str) -> Result<()> {
    // Compile once for hot paths.
    static ZONE_NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = ZONE_NAME_RE
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _-]{0,63}$").unwrap());

    if !re.is_match(name) {
        return Err(anyhow!(
            "config: zone name must match ^[A-Za-z0-9][A-Za-z0-9 _-]{{0,63}}$"
        ));
    }
    Ok(())
}

/// Outcome of testing one detection against a camera's zone list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZoneMatch {
    /// The camera has no enabled zones; the detection passes unrestricted.
    Unrestricted,
    /// The detection matched this enabled zone (first match in order).
    Zone(String),
    /// Enabled zones exist but none matched.
    Outside,
}

/// Tests detections against a camera's configured zones.
pub struct ZoneFilter<'a> {
    zones: &'a [DetectionZone],
}

impl<'a> ZoneFilter<'a> {
    pub fn new(zones: &'a [DetectionZone]) -> Self {
        Self { zones }
    }

    pub fn evaluate(&self, detection: &Detection) -> ZoneMatch {
        if !self.zones.iter().any(|z| z.enabled) {
            return ZoneMatch::Unrestricted;
        }
        for zone in self.zones {
            if zone.matches(detection) {
                return ZoneMatch::Zone(zone.name.clone());
            }
        }
        ZoneMatch::Outside
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
