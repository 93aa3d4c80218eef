//! Per-camera frame sampling and in-flight gating.
//!
//! Real-time policy: staleness is worse than loss. Frames that are not
//! sampled, or that arrive while an inference is already in flight for the
//! camera, are dropped, never queued.

/// Outcome of offering one frame to the throttle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Frame is on the sampling phase and the camera is idle.
    Sampled,
    /// Frame is off the sampling phase; a deliberate skip, not a drop.
    SkippedByInterval,
    /// Frame is on phase but an inference is still in flight for the camera.
    Busy,
}

/// Per-camera frame-sampling and submission gate.
#[derive(Debug, Default)]
pub struct StreamThrottle {
    frame_counter: u64,
    in_flight: bool,
}

impl StreamThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer one frame. The counter advances unconditionally, so every
    /// submitted frame moves the sampling phase whether or not it is accepted.
    ///
    /// Frame `k` (counting from zero) is on phase iff `k % interval == 0`.
    pub fn offer(&mut self, interval: u64) -> ThrottleDecision {
        let interval = interval.max(1);
        let on_phase = self.frame_counter % interval == 0;
        self.frame_counter = self.frame_counter.wrapping_add(1);

        if !on_phase {
            ThrottleDecision::SkippedByInterval
        } else if self.in_flight {
            ThrottleDecision::Busy
        } else {
            ThrottleDecision::Sampled
        }
    }

    pub fn mark_in_flight(&mut self) {
        self.in_flight = true;
    }

    pub fn clear_in_flight(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn frames_seen(&self) -> u64 {
        self.frame_counter
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
