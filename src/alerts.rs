//! Cooldown-debounced alert policy.
//!
//! Each tracked alert key moves Idle -> Cooling -> Idle. A qualifying
//! detection fires an alert when its key is Idle (no prior alert, or the
//! cooldown has elapsed) and re-arms the cooldown. While Cooling, qualifying
//! detections still produce events for history and statistics, only the
//! alert flag is debounced. Detections are never discarded here.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use crate::config::{AlertMode, AlertPolicy};
use crate::zones::ZoneMatch;

/// Outcome of evaluating one qualifying detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertDecision {
    /// True when this detection fired an alert (cooldown was open).
    pub alert_triggered: bool,
}

/// Stateful per-(camera, alert key) debouncer.
pub struct AlertEngine {
    policy: RwLock<AlertPolicy>,
    /// Last alert time in epoch milliseconds, keyed by (camera, alert key).
    last_alert: Mutex<HashMap<(String, String), u64>>,
}

impl AlertEngine {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy: RwLock::new(policy),
            last_alert: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy.read().expect("alert policy lock").clone()
    }

    pub fn set_policy(&self, policy: AlertPolicy) {
        *self.policy.write().expect("alert policy lock") = policy;
    }

    /// Evaluate one surviving, zone-filtered detection.
    ///
    /// Returns `None` when the detection does not qualify under the current
    /// alert mode (no event is produced at all), otherwise the debounced
    /// alert decision.
    pub fn evaluate(
        &self,
        camera_id: &str,
        label: &str,
        zone: &ZoneMatch,
        now_ms: u64,
    ) -> Option<AlertDecision> {
        let policy = self.policy.read().expect("alert policy lock").clone();

        let qualifies = match policy.mode {
            AlertMode::Disabled => false,
            AlertMode::Any => true,
            AlertMode::Specific => policy.alert_classes.allows(label),
            AlertMode::Zone => matches!(zone, ZoneMatch::Zone(_)),
        };
        if !qualifies {
            return None;
        }

        let alert_key = match (&policy.mode, zone) {
            (AlertMode::Zone, ZoneMatch::Zone(name)) => format!("{}@{}", label, name),
            _ => label.to_string(),
        };

        let cooldown_ms = policy.cooldown.as_millis() as u64;
        let key = (camera_id.to_string(), alert_key);
        let mut last_alert = self.last_alert.lock().expect("alert state lock");

        let triggered = match last_alert.get(&key) {
            Some(&last) => now_ms.saturating_sub(last) >= cooldown_ms,
            None => true,
        };
        if triggered {
            last_alert.insert(key, now_ms);
        }

        Some(AlertDecision {
            alert_triggered: triggered,
        })
    }

    /// Forget alert state for one camera. Idempotent.
    pub fn reset_camera(&self, camera_id: &str) {
        self.last_alert
            .lock()
            .expect("alert state lock")
            .retain(|(camera, _), _| camera != camera_id);
    }

    /// Forget all alert state.
    pub fn reset(&self) {
        self.last_alert.lock().expect("alert state lock").clear();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassFilter;
    use std::time::Duration;

    fn policy(mode: AlertMode) -> AlertPolicy {
        AlertPolicy {
            mode,
            alert_classes: ClassFilter::All,
            cooldown: Duration::from_secs(10),
        }
    }

    #[test]
    fn disabled_mode_produces_no_events() {
        let engine = AlertEngine::new(policy(AlertMode::Disabled));
        assert!(engine
            .evaluate("cam", "person", &ZoneMatch::Unrestricted, 0)
            .is_none());
    }

    #[test]
    fn first_alert_fires_then_cooldown_debounces() {
        let engine = AlertEngine::new(policy(AlertMode::Any));

        let first = engine
            .evaluate("cam", "person", &ZoneMatch::Unrestricted, 1_000)
            .unwrap();
        assert!(first.alert_triggered);

        // Inside the 10s cooldown: event produced, alert suppressed.
        let second = engine
            .evaluate("cam", "person", &ZoneMatch::Unrestricted, 10_999)
            .unwrap();
        assert!(!second.alert_triggered);

        // At exactly cooldown elapsed: fires again.
        let third = engine
            .evaluate("cam", "person", &ZoneMatch::Unrestricted, 11_000)
            .unwrap();
        assert!(third.alert_triggered);
    }

    #[test]
    fn cooldown_is_tracked_per_alert_key() {
        let engine = AlertEngine::new(policy(AlertMode::Any));

        assert!(engine
            .evaluate("cam", "person", &ZoneMatch::Unrestricted, 0)
            .unwrap()
            .alert_triggered);
        // Different label, same camera: independent key.
        assert!(engine
            .evaluate("cam", "car", &ZoneMatch::Unrestricted, 1)
            .unwrap()
            .alert_triggered);
        // Same label, different camera: independent key.
        assert!(engine
            .evaluate("cam2", "person", &ZoneMatch::Unrestricted, 2)
            .unwrap()
            .alert_triggered);
    }

    #[test]
    fn specific_mode_requires_listed_class() {
        let engine = AlertEngine::new(AlertPolicy {
            mode: AlertMode::Specific,
            alert_classes: ClassFilter::only(["person"]),
            cooldown: Duration::from_secs(10),
        });

        assert!(engine
            .evaluate("cam", "car", &ZoneMatch::Unrestricted, 0)
            .is_none());
        assert!(engine
            .evaluate("cam", "person", &ZoneMatch::Unrestricted, 0)
            .is_some());
    }

    #[test]
    fn specific_mode_with_empty_classes_never_qualifies() {
        let engine = AlertEngine::new(AlertPolicy {
            mode: AlertMode::Specific,
            alert_classes: ClassFilter::only(Vec::<String>::new()),
            cooldown: Duration::from_secs(10),
        });

        assert!(engine
            .evaluate("cam", "person", &ZoneMatch::Unrestricted, 0)
            .is_none());
    }

    #[test]
    fn zone_mode_requires_zone_match() {
        let engine = AlertEngine::new(policy(AlertMode::Zone));

        assert!(engine
            .evaluate("cam", "person", &ZoneMatch::Outside, 0)
            .is_none());
        assert!(engine
            .evaluate("cam", "person", &ZoneMatch::Unrestricted, 0)
            .is_none());

        let zone = ZoneMatch::Zone("porch".to_string());
        assert!(engine.evaluate("cam", "person", &zone, 0).is_some());
    }

    #[test]
    fn zone_mode_keys_include_zone_name() {
        let engine = AlertEngine::new(policy(AlertMode::Zone));
        let porch = ZoneMatch::Zone("porch".to_string());
        let drive = ZoneMatch::Zone("driveway".to_string());

        assert!(engine
            .evaluate("cam", "person", &porch, 0)
            .unwrap()
            .alert_triggered);
        // Same label in a different zone is an independent cooldown.
        assert!(engine
            .evaluate("cam", "person", &drive, 1)
            .unwrap()
            .alert_triggered);
        // Same zone again inside cooldown: debounced.
        assert!(!engine
            .evaluate("cam", "person", &porch, 2)
            .unwrap()
            .alert_triggered);
    }

    #[test]
    fn reset_camera_forgets_only_that_camera() {
        let engine = AlertEngine::new(policy(AlertMode::Any));
        engine.evaluate("a", "person", &ZoneMatch::Unrestricted, 0);
        engine.evaluate("b", "person", &ZoneMatch::Unrestricted, 0);

        engine.reset_camera("a");

        // Camera "a" fires fresh; camera "b" is still cooling.
        assert!(engine
            .evaluate("a", "person", &ZoneMatch::Unrestricted, 1)
            .unwrap()
            .alert_triggered);
        assert!(!engine
            .evaluate("b", "person", &ZoneMatch::Unrestricted, 1)
            .unwrap()
            .alert_triggered);
    }
}
