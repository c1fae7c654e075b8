//! DSP building blocks
//!
//! Pure, allocation-free pieces the audio path is made of:
//! - All-pass coefficient formula
//! - Per-channel biquad history
//! - Parameter smoothing
//! - Spread distribution of stage frequencies

mod biquad;
mod coefficients;
pub mod smoothing;
pub mod spread;

pub use biquad::BiquadState;
pub use coefficients::AllpassCoefficients;
pub use smoothing::{SmoothedValue, SmoothingStyle};
pub use spread::{stage_frequency, SpreadBand};
