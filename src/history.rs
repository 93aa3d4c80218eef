//! Bounded event history with CSV export.
//!
//! Insertion-ordered ring of recent `DetectionEvent`s. When full, the oldest
//! entry is evicted; the pipeline relinquishes ownership of an event once it
//! is pushed here.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::events::DetectionEvent;

const CSV_HEADER: &str =
    "camera_id,camera_name,label,confidence,x,y,w,h,zone_name,alert_triggered,timestamp_ms";

/// Bounded FIFO of recent detection events.
pub struct EventHistory {
    inner: Mutex<VecDeque<DetectionEvent>>,
    capacity: usize,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an event, evicting the oldest entry when at capacity.
    pub fn push(&self, event: DetectionEvent) {
        let mut inner = self.inner.lock().expect("event history lock");
        while inner.len() >= self.capacity {
            inner.pop_front();
        }
        inner.push_back(event);
    }

    /// The most recent `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<DetectionEvent> {
        let inner = self.inner.lock().expect("event history lock");
        inner.iter().rev().take(limit).cloned().collect()
    }

    /// The most recent `limit` alert-firing events, newest first.
    pub fn recent_alerts(&self, limit: usize) -> Vec<DetectionEvent> {
        let inner = self.inner.lock().expect("event history lock");
        inner
            .iter()
            .rev()
            .filter(|event| event.alert_triggered)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("event history lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.inner.lock().expect("event history lock").clear();
    }

    /// Export the full history, oldest to newest, as CSV.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let rendered = self.render_csv();
        std::fs::write(path, rendered)
            .with_context(|| format!("writing event export to {}", path.display()))?;
        Ok(())
    }

    fn render_csv(&self) -> String {
        let inner = self.inner.lock().expect("event history lock");
        let mut out = String::with_capacity(64 + inner.len() * 96);
        out.push_str(CSV_HEADER);
        out.push('\n');
        for event in inner.iter() {
            let bbox = event.detection.bbox;
            out.push_str(&format!(
                "{},{},{},{:.4},{:.4},{:.4},{:.4},{:.4},{},{},{}\n",
                csv_field(&event.camera_id),
                csv_field(&event.camera_name),
                csv_field(&event.detection.label),
                event.detection.confidence,
                bbox.x,
                bbox.y,
                bbox.w,
                bbox.h,
                csv_field(event.zone_name.as_deref().unwrap_or("")),
                event.alert_triggered,
                event.timestamp_ms,
            ));
        }
        out
    }
}

/// Quote a field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};

    fn event(camera_id: &str, timestamp_ms: u64, alert: bool) -> DetectionEvent {
        DetectionEvent {
            camera_id: camera_id.to_string(),
            camera_name: "Front Door".to_string(),
            detection: Detection::new("person", 0.9, BoundingBox::new(0.1, 0.1, 0.2, 0.2))
                .with_timestamp(timestamp_ms),
            timestamp_ms,
            zone_name: Some("porch".to_string()),
            alert_triggered: alert,
            snapshot: None,
        }
    }

    #[test]
    fn history_never_exceeds_capacity() {
        let history = EventHistory::new(3);
        for i in 0..10 {
            history.push(event("cam", i, false));
        }
        assert_eq!(history.len(), 3);

        // Oldest entries were evicted first.
        let recent = history.recent(3);
        let timestamps: Vec<_> = recent.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(timestamps, vec![9, 8, 7]);
    }

    #[test]
    fn recent_returns_newest_first() {
        let history = EventHistory::new(10);
        for i in 0..5 {
            history.push(event("cam", i, false));
        }
        let recent = history.recent(2);
        assert_eq!(recent[0].timestamp_ms, 4);
        assert_eq!(recent[1].timestamp_ms, 3);
    }

    #[test]
    fn recent_alerts_filters_to_triggered_events() {
        let history = EventHistory::new(10);
        history.push(event("cam", 0, true));
        history.push(event("cam", 1, false));
        history.push(event("cam", 2, true));

        let alerts = history.recent_alerts(10);
        let timestamps: Vec<_> = alerts.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(timestamps, vec![2, 0]);
    }

    #[test]
    fn clear_empties_history() {
        let history = EventHistory::new(4);
        history.push(event("cam", 0, false));
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn csv_export_is_oldest_to_newest_with_header() {
        let history = EventHistory::new(10);
        history.push(event("cam-1", 100, true));
        history.push(event("cam-1", 200, false));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.csv");
        history.export_csv(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("cam-1,Front Door,person,0.9000"));
        assert!(lines[1].contains(",true,100"));
        assert!(lines[2].contains(",false,200"));
    }

    #[test]
    fn csv_fields_with_commas_are_quoted() {
        let mut ev = event("cam", 0, false);
        ev.camera_name = "Door, Front".to_string();
        let history = EventHistory::new(2);
        history.push(ev);

        let rendered = history.render_csv();
        assert!(rendered.contains("\"Door, Front\""));
    }

    #[test]
    fn export_to_invalid_path_fails_synchronously() {
        let history = EventHistory::new(2);
        history.push(event("cam", 0, false));
        let err = history.export_csv(Path::new("/nonexistent-dir/events.csv"));
        assert!(err.is_err());
    }
}
