//! Spread distribution
//!
//! Maps a stage index to the frequency that stage should be tuned to when
//! the cascade's stages are spread across a band around the center
//! frequency instead of all sharing it.
//!
//! The band is `[f0 - w/2, f0 + w/2]`, clamped to
//! `[MIN_FREQUENCY, sample_rate / 2.1]`. The first stage sits on the low
//! edge and the last on the high edge. Clamping silently compresses the
//! realized band at extreme settings; that is accepted shaping, not an
//! error.

use crate::params::SpreadCurve;
use crate::types::{max_frequency, MIN_FREQUENCY};

/// Inputs shared by every stage of one coefficient update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadBand {
    /// Clamped low edge in Hz
    pub low: f32,
    /// Clamped high edge in Hz
    pub high: f32,
    /// Distribution curve
    pub curve: SpreadCurve,
}

impl SpreadBand {
    /// Compute the clamped band for a center frequency and signed width
    pub fn new(center: f32, width: f32, curve: SpreadCurve, sample_rate: f32) -> Self {
        let f_max = max_frequency(sample_rate);
        let clamp = |f: f32| f.max(MIN_FREQUENCY).min(f_max);
        Self {
            low: clamp(center - width / 2.0),
            high: clamp(center + width / 2.0),
            curve,
        }
    }

    /// Frequency for stage `index` of `num_stages`
    #[inline]
    pub fn stage_frequency(&self, index: usize, num_stages: usize) -> f32 {
        let factor = if num_stages <= 1 {
            0.5
        } else {
            index as f32 / (num_stages - 1) as f32
        };

        match self.curve {
            SpreadCurve::Linear => self.low + (self.high - self.low) * factor,
            SpreadCurve::Logarithmic => {
                let (ln_low, ln_high) = (self.low.ln(), self.high.ln());
                (ln_low + (ln_high - ln_low) * factor).exp()
            }
        }
    }
}

/// Frequency for stage `index` of `num_stages`
///
/// Convenience wrapper around [`SpreadBand`] for one-off queries; the
/// engine builds the band once per update and reuses it for every stage.
pub fn stage_frequency(
    center: f32,
    width: f32,
    curve: SpreadCurve,
    sample_rate: f32,
    index: usize,
    num_stages: usize,
) -> f32 {
    SpreadBand::new(center, width, curve, sample_rate).stage_frequency(index, num_stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    #[test]
    fn test_linear_four_stages() {
        // Band low edge 0 Hz clamps to 5 Hz, high edge 2000 Hz
        let band = SpreadBand::new(1_000.0, 2_000.0, SpreadCurve::Linear, SAMPLE_RATE);
        assert_eq!(band.low, MIN_FREQUENCY);
        assert_eq!(band.high, 2_000.0);

        let freqs: Vec<f32> = (0..4).map(|i| band.stage_frequency(i, 4)).collect();
        let expected = [5.0, 5.0 + 1_995.0 / 3.0, 5.0 + 2.0 * 1_995.0 / 3.0, 2_000.0];
        for (got, want) in freqs.iter().zip(expected) {
            assert!((got - want).abs() < 1e-2, "got {:?}, want {:?}", freqs, expected);
        }
    }

    #[test]
    fn test_single_stage_is_midpoint() {
        for curve in [SpreadCurve::Linear, SpreadCurve::Logarithmic] {
            let band = SpreadBand::new(1_000.0, 1_000.0, curve, SAMPLE_RATE);
            let f = band.stage_frequency(0, 1);
            let expected = match curve {
                SpreadCurve::Linear => 1_000.0,
                // Geometric midpoint of 500 and 1500
                SpreadCurve::Logarithmic => (500.0_f32 * 1_500.0).sqrt(),
            };
            assert!((f - expected).abs() < 0.1, "{:?}: {} vs {}", curve, f, expected);
        }
    }

    #[test]
    fn test_monotonic_for_positive_spread() {
        for curve in [SpreadCurve::Linear, SpreadCurve::Logarithmic] {
            for n in [2, 3, 17, 512] {
                let band = SpreadBand::new(3_000.0, 4_500.0, curve, SAMPLE_RATE);
                let freqs: Vec<f32> = (0..n).map(|i| band.stage_frequency(i, n)).collect();
                assert!(
                    freqs.windows(2).all(|w| w[0] <= w[1]),
                    "{:?} with {} stages is not monotonic",
                    curve,
                    n
                );
            }
        }
    }

    #[test]
    fn test_edges_hit_band_limits() {
        let band = SpreadBand::new(2_000.0, 2_000.0, SpreadCurve::Logarithmic, SAMPLE_RATE);
        assert!((band.stage_frequency(0, 8) - 1_000.0).abs() < 0.1);
        assert!((band.stage_frequency(7, 8) - 3_000.0).abs() < 0.5);
    }

    #[test]
    fn test_negative_spread_descends() {
        let band = SpreadBand::new(2_000.0, -2_000.0, SpreadCurve::Linear, SAMPLE_RATE);
        assert_eq!(band.stage_frequency(0, 3), 3_000.0);
        assert_eq!(band.stage_frequency(2, 3), 1_000.0);
    }

    #[test]
    fn test_band_clamped_below_nyquist() {
        let f = stage_frequency(20_000.0, 10_000.0, SpreadCurve::Linear, SAMPLE_RATE, 1, 2);
        assert!(f <= SAMPLE_RATE / 2.1 + 0.01, "{} Hz is above the ceiling", f);
    }
}
