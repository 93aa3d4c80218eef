use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in normalized coordinates.
///
/// All four components are expressed as fractions of the frame (0.0..=1.0),
/// so boxes are comparable across cameras with different resolutions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Center point of the box.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// True when the point lies inside the box (edges inclusive).
    pub fn contains_point(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
    }

    /// Intersection-over-Union with another box.
    ///
    /// `intersection / (area_a + area_b - intersection)`; zero when the boxes
    /// do not overlap or when the union is degenerate.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x + self.w).min(other.x + other.w) - self.x.max(other.x);
        let iy = (self.y + self.h).min(other.y + other.h) - self.y.max(other.y);
        if ix <= 0.0 || iy <= 0.0 {
            return 0.0;
        }
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

/// One recognized object instance. Immutable once produced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Detection {
    /// Object label (e.g., "person", "car").
    pub label: String,
    /// Confidence score (0.0..=1.0).
    pub confidence: f32,
    /// Bounding box in normalized coordinates.
    pub bbox: BoundingBox,
    /// Optional tracker-assigned identity.
    pub tracking_id: Option<String>,
    /// Milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
            tracking_id: None,
            timestamp_ms: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
