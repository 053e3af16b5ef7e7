//! Device clock reconciliation
//!
//! Three clocks meet here: decode order (the order packets are fed), the
//! presentation timestamps the engine attaches, and the device's own
//! free-running playtime. The device only exposes the last one, either by
//! query or through frame-ready notifications.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

/// Convert a device nanosecond value to a duration, clamping negatives to zero
pub fn ns_to_duration(ns: i64) -> Duration {
    Duration::from_nanos(u64::try_from(ns).unwrap_or(0))
}

/// Turns the polled device playtime into "new frame" decisions.
///
/// A frame is only reported when the playtime moved since the previous
/// poll; an unchanged clock means the device has nothing new to show.
#[derive(Debug, Clone, Default)]
pub struct ClockReconciler {
    last_playtime_ns: i64,
}

impl ClockReconciler {
    /// Create a reconciler whose last observation is zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a playtime sample; returns the presentation time if it advanced
    pub fn observe(&mut self, playtime_ns: i64) -> Option<Duration> {
        if playtime_ns == self.last_playtime_ns {
            return None;
        }
        self.last_playtime_ns = playtime_ns;
        Some(ns_to_duration(playtime_ns))
    }

    /// Last device playtime seen, in nanoseconds
    pub fn last_playtime_ns(&self) -> i64 {
        self.last_playtime_ns
    }
}

/// Accumulator and playtime shared between an audio session and its
/// callback thread.
///
/// Each field has one writer: the owning thread writes `pts`, the callback
/// thread writes `playtime` and `delay`. Readers on either side see
/// race-free values through atomics.
#[derive(Debug, Default)]
pub struct AudioClock {
    pts_ns: AtomicI64,
    playtime_ns: AtomicI64,
    delay_ns: AtomicI64,
    frame_ready_seen: AtomicBool,
}

impl AudioClock {
    /// Create a zeroed clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Current accumulator value in nanoseconds
    pub fn pts_ns(&self) -> i64 {
        self.pts_ns.load(Ordering::Acquire)
    }

    /// Advance the accumulator; owning thread only
    pub fn advance(&self, by_ns: i64) -> i64 {
        let next = self.pts_ns().saturating_add(by_ns.max(0));
        self.pts_ns.store(next, Ordering::Release);
        next
    }

    /// Reset the accumulator and forget all device observations
    pub fn reset(&self) {
        self.pts_ns.store(0, Ordering::Release);
        self.playtime_ns.store(0, Ordering::Release);
        self.delay_ns.store(0, Ordering::Release);
        self.frame_ready_seen.store(false, Ordering::Release);
    }

    /// Frame-ready notification; callback thread only
    pub fn on_frame_ready(&self, playtime_ns: i64) {
        self.playtime_ns.store(playtime_ns, Ordering::Release);
        self.delay_ns
            .store(self.pts_ns().saturating_sub(playtime_ns), Ordering::Release);
        self.frame_ready_seen.store(true, Ordering::Release);
    }

    /// Last device playtime reported by a frame-ready event
    pub fn playtime_ns(&self) -> i64 {
        self.playtime_ns.load(Ordering::Acquire)
    }

    /// Queued-but-unplayed time, only meaningful after a frame-ready event
    pub fn delay_ns(&self) -> Option<i64> {
        if self.frame_ready_seen.load(Ordering::Acquire) {
            Some(self.delay_ns.load(Ordering::Acquire))
        } else {
            None
        }
    }
}
