//! Parameter smoothing for real-time audio
//!
//! A fixed-length ramp between the current and the target value: every
//! new target restarts a ramp of `ramp_samples` steps. Linear ramps suit
//! signed values (spread, resonance); logarithmic ramps move by a constant
//! ratio per sample and suit frequencies.

/// Shape of the ramp between current and target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingStyle {
    /// Constant step per sample
    Linear,
    /// Constant ratio per sample; values must stay strictly positive
    Logarithmic,
}

/// Smoothed parameter with a fixed-length ramp
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    style: SmoothingStyle,
    current: f32,
    target: f32,
    /// Additive (linear) or multiplicative (logarithmic) step per sample
    step: f32,
    /// Ramp length in samples, derived from the sample rate
    ramp_samples: u32,
    /// Steps left until `current == target`
    steps_remaining: u32,
}

impl SmoothedValue {
    /// Create a smoother resting at `initial`
    ///
    /// Ramps are instantaneous until [`SmoothedValue::reset`] sets a ramp
    /// length.
    pub fn new(style: SmoothingStyle, initial: f32) -> Self {
        Self {
            style,
            current: initial,
            target: initial,
            step: Self::identity_step(style),
            ramp_samples: 0,
            steps_remaining: 0,
        }
    }

    fn identity_step(style: SmoothingStyle) -> f32 {
        match style {
            SmoothingStyle::Linear => 0.0,
            SmoothingStyle::Logarithmic => 1.0,
        }
    }

    /// Set the ramp length for a sample rate and stop any ramp in progress
    pub fn reset(&mut self, sample_rate: f32, ramp_ms: f32) {
        self.ramp_samples = (sample_rate * ramp_ms / 1000.0).round().max(0.0) as u32;
        self.set_current_and_target(self.target);
    }

    /// Jump to `value` without ramping
    pub fn set_current_and_target(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = Self::identity_step(self.style);
        self.steps_remaining = 0;
    }

    /// Start ramping toward `target`
    ///
    /// Setting the same target again does not restart the ramp, so this can
    /// be called every block with the latest control value.
    pub fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        if self.ramp_samples == 0 {
            self.set_current_and_target(target);
            return;
        }

        self.target = target;
        self.steps_remaining = self.ramp_samples;
        let steps = self.ramp_samples as f32;
        self.step = match self.style {
            SmoothingStyle::Linear => (target - self.current) / steps,
            SmoothingStyle::Logarithmic => {
                ((target.ln() - self.current.ln()) / steps).exp()
            }
        };
    }

    /// Advance one sample and return the new current value
    ///
    /// Once the ramp is done this keeps returning the target.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.steps_remaining == 0 {
            return self.target;
        }

        self.steps_remaining -= 1;
        if self.steps_remaining == 0 {
            self.current = self.target;
        } else {
            match self.style {
                SmoothingStyle::Linear => self.current += self.step,
                SmoothingStyle::Logarithmic => self.current *= self.step,
            }
        }
        self.current
    }

    /// Check if a ramp is still in progress
    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.steps_remaining > 0
    }
}
