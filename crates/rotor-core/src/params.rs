//! Control parameters
//!
//! The six values a host exposes to the user. They are validated here, at
//! the control boundary, so the audio path can assume every value is in
//! range and never re-checks.

use serde::{Deserialize, Serialize};

use crate::types::MAX_STAGES;

/// How stage frequencies are distributed across the spread band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpreadCurve {
    /// Equal frequency ratios between stages (perceptually even)
    #[default]
    Logarithmic,
    /// Equal frequency differences between stages
    Linear,
}

impl SpreadCurve {
    /// Map the host's boolean "linear spread" switch to a curve
    pub fn from_linear(linear: bool) -> Self {
        if linear {
            SpreadCurve::Linear
        } else {
            SpreadCurve::Logarithmic
        }
    }
}

/// Range metadata for one numeric parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    /// Parameter name for display
    pub name: &'static str,
    /// Lowest accepted value
    pub min: f32,
    /// Highest accepted value
    pub max: f32,
    /// Value used when nothing else is known
    pub default: f32,
    /// Unit label (e.g., "Hz")
    pub unit: &'static str,
}

impl ParamRange {
    /// Clamp a value into this range, mapping NaN to the default
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Number of all-pass stages
pub const FILTER_STAGES: ParamRange = ParamRange {
    name: "Filter Stages",
    min: 0.0,
    max: MAX_STAGES as f32,
    default: 0.0,
    unit: "",
};

/// Center frequency of the cascade
pub const FREQUENCY: ParamRange = ParamRange {
    name: "Filter Frequency",
    min: 5.0,
    max: 20_000.0,
    default: 1_000.0,
    unit: "Hz",
};

/// Resonance (Q) of every stage
pub const RESONANCE: ParamRange = ParamRange {
    name: "Filter Resonance",
    min: 0.01,
    max: 30.0,
    default: 0.5,
    unit: "Q",
};

/// Width of the band the stage frequencies are spread across
pub const SPREAD: ParamRange = ParamRange {
    name: "Filter Spread",
    min: -5_000.0,
    max: 5_000.0,
    default: 0.0,
    unit: "Hz",
};

/// Samples between coefficient recomputes while parameters ramp
pub const SMOOTHING_INTERVAL: ParamRange = ParamRange {
    name: "Smoothing Interval",
    min: 1.0,
    max: 512.0,
    default: 1.0,
    unit: "samples",
};

/// The full set of control values
///
/// Serializable so a host adapter can persist it as opaque state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotorParams {
    /// Number of all-pass stages (0 = bypass)
    pub filter_stages: u32,
    /// Center frequency in Hz
    pub frequency: f32,
    /// Resonance (Q)
    pub resonance: f32,
    /// Signed spread width in Hz
    pub spread: f32,
    /// Distribution of stage frequencies inside the spread band
    pub spread_curve: SpreadCurve,
    /// Samples between coefficient recomputes (1 = every sample)
    pub smoothing_interval: u32,
}

impl Default for RotorParams {
    fn default() -> Self {
        Self {
            filter_stages: FILTER_STAGES.default as u32,
            frequency: FREQUENCY.default,
            resonance: RESONANCE.default,
            spread: SPREAD.default,
            spread_curve: SpreadCurve::default(),
            smoothing_interval: SMOOTHING_INTERVAL.default as u32,
        }
    }
}

impl RotorParams {
    /// Return a copy with every value clamped into its range
    pub fn clamped(&self) -> Self {
        Self {
            filter_stages: self.filter_stages.min(MAX_STAGES as u32),
            frequency: FREQUENCY.clamp(self.frequency),
            resonance: RESONANCE.clamp(self.resonance),
            spread: SPREAD.clamp(self.spread),
            spread_curve: self.spread_curve,
            smoothing_interval: self
                .smoothing_interval
                .clamp(SMOOTHING_INTERVAL.min as u32, SMOOTHING_INTERVAL.max as u32),
        }
    }
}
