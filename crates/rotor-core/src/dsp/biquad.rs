//! Per-channel biquad history
//!
//! The state only stores the delay line. Coefficients are handed in on
//! every call so that all channels of a stage read the same coefficient set
//! and an update is visible to every channel at once.

use super::AllpassCoefficients;
use crate::types::Sample;

/// Values below this are flushed to zero to keep long decaying cascades
/// out of the denormal range
const DENORMAL_THRESHOLD: f32 = 1e-30;

#[inline]
fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        x
    }
}

/// Direct-form-I delay line for one channel of one stage
///
/// Direct form I keeps input and output history separate from the
/// coefficients, so swapping coefficients mid-stream leaves the history
/// meaningful and does not click.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    /// Create a state with empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one sample
    #[inline]
    pub fn process(&mut self, input: Sample, coeffs: &AllpassCoefficients) -> Sample {
        let [b0, b1, b2, _, a1, a2] = coeffs.as_array();
        let output = b0 * input + b1 * self.x1 + b2 * self.x2 - a1 * self.y1 - a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = flush_denormal(output);

        output
    }

    /// Clear the history
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_passes_through() {
        let coeffs = AllpassCoefficients::default();
        let mut state = BiquadState::new();
        for &x in &[1.0, 0.5, -0.5, 0.0, 1.0] {
            assert_eq!(state.process(x, &coeffs), x);
        }
    }

    #[test]
    fn test_allpass_preserves_energy() {
        let coeffs = AllpassCoefficients::allpass(48_000.0, 1_000.0, 0.707);
        let mut state = BiquadState::new();

        // Impulse response energy of an all-pass is 1
        let mut energy = 0.0_f64;
        for i in 0..48_000 {
            let x = if i == 0 { 1.0 } else { 0.0 };
            let y = state.process(x, &coeffs) as f64;
            energy += y * y;
        }
        assert!((energy - 1.0).abs() < 1e-3, "impulse energy = {}", energy);
    }

    #[test]
    fn test_sine_amplitude_unchanged() {
        let sample_rate = 48_000.0_f32;
        let coeffs = AllpassCoefficients::allpass(sample_rate, 1_000.0, 0.5);
        let mut state = BiquadState::new();

        let freq = 1_000.0_f32;
        let mut peak = 0.0_f32;
        for i in 0..9_600 {
            let x = (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin();
            let y = state.process(x, &coeffs);
            // Skip the transient
            if i > 4_800 {
                peak = peak.max(y.abs());
            }
        }
        assert!((peak - 1.0).abs() < 0.01, "steady-state peak = {}", peak);
    }

    #[test]
    fn test_reset_clears_history() {
        let coeffs = AllpassCoefficients::allpass(48_000.0, 1_000.0, 0.5);
        let mut state = BiquadState::new();
        state.process(1.0, &coeffs);
        assert_ne!(state, BiquadState::new());

        state.reset();
        assert_eq!(state, BiquadState::new());
    }

    #[test]
    fn test_history_survives_coefficient_change() {
        let a = AllpassCoefficients::allpass(48_000.0, 1_000.0, 0.5);
        let b = AllpassCoefficients::allpass(48_000.0, 2_000.0, 0.5);
        let mut state = BiquadState::new();
        state.process(1.0, &a);
        let before = state;

        // Next sample with new coefficients still sees the previous input
        let out = state.process(0.0, &b);
        assert_ne!(before, BiquadState::new());
        assert!(out != 0.0);
    }
}
