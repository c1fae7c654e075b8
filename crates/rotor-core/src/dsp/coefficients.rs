//! All-pass biquad coefficients
//!
//! Audio EQ Cookbook all-pass, pre-normalized so `a0 == 1`. A second-order
//! all-pass has unity magnitude at every frequency and a phase of −180° at
//! its center frequency, which is what makes the cascade a phase rotator.

use std::f64::consts::PI;

/// One all-pass transfer function: 3 numerator + 3 denominator terms
///
/// The only constructor that produces real filter coefficients is
/// [`AllpassCoefficients::allpass`]; the denominator is always normalized.
/// The terms are read-only outside this module:
///
/// ```compile_fail
/// let mut c = rotor_core::dsp::AllpassCoefficients::allpass(48_000.0, 1_000.0, 0.5);
/// c.b0 = 2.0;
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllpassCoefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a0: f32,
    a1: f32,
    a2: f32,
}

impl Default for AllpassCoefficients {
    /// Identity (wire) coefficients
    ///
    /// Used as a placeholder for freshly allocated stages. They are
    /// overwritten on the first processed block because the cascade is
    /// published uninitialized.
    fn default() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl AllpassCoefficients {
    /// Compute all-pass coefficients for a center frequency and Q
    ///
    /// The caller is responsible for keeping `frequency` inside
    /// `[MIN_FREQUENCY, sample_rate / 2.1]` and `q` positive.
    pub fn allpass(sample_rate: f32, frequency: f32, q: f32) -> Self {
        let omega = 2.0 * PI * frequency as f64 / sample_rate as f64;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q as f64);

        let a0 = 1.0 + alpha;
        // Numerator is the mirrored denominator, so b0 == a2 and b1 == a1
        // bit for bit. That keeps the magnitude exactly flat after rounding.
        let outer = ((1.0 - alpha) / a0) as f32;
        let middle = ((-2.0 * cos_omega) / a0) as f32;

        Self {
            b0: outer,
            b1: middle,
            b2: 1.0,
            a0: 1.0,
            a1: middle,
            a2: outer,
        }
    }

    /// Coefficients as `[b0, b1, b2, a0, a1, a2]`
    #[inline]
    pub fn as_array(&self) -> [f32; 6] {
        [self.b0, self.b1, self.b2, self.a0, self.a1, self.a2]
    }

    /// Evaluate the transfer function at `frequency`
    ///
    /// Returns `(magnitude, phase)` with the phase in radians, wrapped to
    /// `(-π, π]`.
    pub fn frequency_response(&self, frequency: f32, sample_rate: f32) -> (f64, f64) {
        let omega = 2.0 * PI * frequency as f64 / sample_rate as f64;
        let (sin1, cos1) = omega.sin_cos();
        let (sin2, cos2) = (2.0 * omega).sin_cos();

        let [b0, b1, b2, a0, a1, a2] = self.as_array().map(f64::from);

        let num_re = b0 + b1 * cos1 + b2 * cos2;
        let num_im = -(b1 * sin1 + b2 * sin2);
        let den_re = a0 + a1 * cos1 + a2 * cos2;
        let den_im = -(a1 * sin1 + a2 * sin2);

        let magnitude = num_re.hypot(num_im) / den_re.hypot(den_im);
        let mut phase = num_im.atan2(num_re) - den_im.atan2(den_re);
        while phase <= -PI {
            phase += 2.0 * PI;
        }
        while phase > PI {
            phase -= 2.0 * PI;
        }

        (magnitude, phase)
    }
}
