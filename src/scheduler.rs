//! Global admission control for inference calls.
//!
//! The scheduler is the single coordination point across all camera threads.
//! Admission is a compare-and-swap on an atomic in-flight counter: either a
//! slot is free and the caller proceeds, or the frame is dropped. No queueing,
//! O(1) per decision.
//!
//! Slots are released through an RAII guard so an inference worker cannot
//! leak a slot on any exit path, success or error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Bounded-concurrency admission counter.
pub struct InferenceScheduler {
    in_flight: AtomicUsize,
    limit: AtomicUsize,
}

impl InferenceScheduler {
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            in_flight: AtomicUsize::new(0),
            limit: AtomicUsize::new(max_concurrent.max(1)),
        })
    }

    /// Try to acquire an inference slot. Returns `None` when all slots are
    /// taken; the caller is expected to drop the frame.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SlotGuard> {
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= self.limit.load(Ordering::Acquire) {
                return None;
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(SlotGuard {
                        scheduler: Arc::clone(self),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Update the concurrency limit. Takes effect for subsequent admissions;
    /// in-flight calls above a lowered limit drain naturally.
    pub fn set_limit(&self, max_concurrent: usize) {
        self.limit.store(max_concurrent.max(1), Ordering::Release);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn limit(&self) -> usize {
        self.limit.load(Ordering::Acquire)
    }
}

/// Holds one admission slot; releases it on drop.
pub struct SlotGuard {
    scheduler: Arc<InferenceScheduler>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.scheduler.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn admission_is_bounded() {
        let scheduler = InferenceScheduler::new(2);

        let a = scheduler.try_acquire();
        let b = scheduler.try_acquire();
        let c = scheduler.try_acquire();

        assert!(a.is_some());
        assert!(b.is_some());
        assert!(c.is_none());
        assert_eq!(scheduler.in_flight(), 2);
    }

    #[test]
    fn dropping_guard_frees_slot() {
        let scheduler = InferenceScheduler::new(1);

        let guard = scheduler.try_acquire().unwrap();
        assert!(scheduler.try_acquire().is_none());

        drop(guard);
        assert_eq!(scheduler.in_flight(), 0);
        assert!(scheduler.try_acquire().is_some());
    }

    #[test]
    fn limit_can_shrink_without_cancelling_in_flight() {
        let scheduler = InferenceScheduler::new(3);
        let _a = scheduler.try_acquire().unwrap();
        let _b = scheduler.try_acquire().unwrap();

        scheduler.set_limit(1);
        // Existing slots stay; new admissions are denied until drain.
        assert_eq!(scheduler.in_flight(), 2);
        assert!(scheduler.try_acquire().is_none());
    }

    #[test]
    fn concurrent_acquires_never_exceed_limit() {
        let scheduler = InferenceScheduler::new(4);
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    for _ in 0..200 {
                        if let Some(guard) = scheduler.try_acquire() {
                            let seen = scheduler.in_flight();
                            peak.fetch_max(seen, Ordering::AcqRel);
                            assert!(seen <= scheduler.limit());
                            drop(guard);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(peak.load(Ordering::Acquire) <= 4);
        assert_eq!(scheduler.in_flight(), 0);
    }
}
