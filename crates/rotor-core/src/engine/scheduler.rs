//! Coefficient recompute scheduling
//!
//! Recomputing a stage's coefficients costs a `sin` and a `cos`. With
//! hundreds of stages that is too expensive to do every sample, so while
//! parameters ramp the engine only recomputes every `interval` samples.
//!
//! A recompute is due when:
//! - the cascade was just swapped in uninitialized, or
//! - the spread curve flipped since the previous sample (it cannot be
//!   smoothed), or
//! - the countdown expired and a smoothed value moved since the last
//!   recompute.
//!
//! "Moved since the last recompute" rather than "is still ramping": a ramp
//! that finishes between two recomputes would otherwise leave the
//! coefficients parked one step short of the target.

use crate::params::SpreadCurve;

/// Per-sample recompute decision with an interval throttle
#[derive(Debug, Clone)]
pub struct SmoothingScheduler {
    /// Samples between recomputes while ramping (≥ 1)
    interval: u32,
    /// Samples until the next recompute may run; ≤ 0 means "now"
    countdown: i64,
    /// Curve seen on the previous sample
    last_curve: Option<SpreadCurve>,
    /// A smoothed value changed since the last recompute
    stale: bool,
}

impl SmoothingScheduler {
    /// Create a scheduler recomputing at most every `interval` samples
    pub fn new(interval: u32) -> Self {
        let interval = interval.max(1);
        Self {
            interval,
            countdown: interval as i64,
            last_curve: None,
            stale: false,
        }
    }

    /// Change the interval, taking effect from the next sample
    pub fn set_interval(&mut self, interval: u32) {
        self.interval = interval.max(1);
        self.countdown = self.countdown.min(self.interval as i64);
    }

    /// Forget the previous curve and any pending update
    pub fn reset(&mut self) {
        self.countdown = self.interval as i64;
        self.last_curve = None;
        self.stale = false;
    }

    /// Decide whether this sample must recompute coefficients
    ///
    /// * `ramping` - at least one smoothed parameter moved on this sample
    /// * `initialized` - the active cascade already has real coefficients
    /// * `curve` - the spread curve in effect for this sample
    #[inline]
    pub fn should_recompute(&mut self, ramping: bool, initialized: bool, curve: SpreadCurve) -> bool {
        self.stale |= ramping;
        // Saturate instead of running away while idle
        if self.countdown > 0 {
            self.countdown -= 1;
        }

        let curve_changed = self.last_curve.is_some_and(|last| last != curve);
        self.last_curve = Some(curve);

        let due = !initialized || curve_changed || (self.countdown <= 0 && self.stale);
        if due {
            self.countdown = self.interval as i64;
            self.stale = false;
        }
        due
    }
}
