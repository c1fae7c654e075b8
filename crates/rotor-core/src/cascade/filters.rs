//! The filter cascade stored inside the double buffer
//!
//! Layout is stage-major: `stages[stage].channels[channel]`. Every stage
//! owns a handle into the cascade's coefficient bank instead of a private
//! copy, so one coefficient write is seen by all of that stage's channels.
//! When the spread is off, every stage is routed to the first bank entry
//! and a recompute touches exactly one coefficient set.

use crate::dsp::{AllpassCoefficients, BiquadState, SpreadBand};
use crate::error::{RotorError, RotorResult};
use crate::params::SpreadCurve;
use crate::types::{clamp_frequency, ProcessSpec, Sample};

/// Handle of a coefficient set in the cascade's bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoefficientId(usize);

impl CoefficientId {
    /// The bank entry every stage reads while coefficients are shared
    pub const SHARED: CoefficientId = CoefficientId(0);

    /// Position in the coefficient bank
    pub fn index(self) -> usize {
        self.0
    }
}

/// Which coefficient set each stage reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoefficientRouting {
    /// All stages read [`CoefficientId::SHARED`] (spread is zero)
    #[default]
    Shared,
    /// Each stage reads its own coefficient set
    PerStage,
}

/// One all-pass stage: a coefficient handle plus one filter per channel
#[derive(Debug, Clone)]
pub struct FilterStage {
    coefficients: CoefficientId,
    channels: Vec<BiquadState>,
}

impl FilterStage {
    /// This stage's own coefficient handle
    pub fn coefficient_id(&self) -> CoefficientId {
        self.coefficients
    }

    /// Number of per-channel filters
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }
}

/// An ordered chain of all-pass stages, applied stage 0 first
#[derive(Debug, Clone, Default)]
pub struct FilterCascade {
    /// One coefficient set per stage, indexed by `CoefficientId`
    coefficient_bank: Vec<AllpassCoefficients>,
    stages: Vec<FilterStage>,
    routing: CoefficientRouting,
    /// `false` until the audio thread computed real coefficients for the
    /// current topology
    initialized: bool,
    num_channels: usize,
    spec: Option<ProcessSpec>,
}

impl FilterCascade {
    /// Resize to `num_stages` stages of `spec.num_channels` filters each
    ///
    /// Runs on the control side only. Every filter is prepared for the new
    /// spec with empty history: this slot was last played an arbitrary time
    /// ago and must not replay that audio once it is swapped in. New stages
    /// get placeholder coefficients, and the cascade is marked uninitialized so the audio thread recomputes every
    /// coefficient set on the next block. All growth goes through
    /// `try_reserve`, so an allocation failure surfaces as an error instead
    /// of an abort.
    pub fn reconfigure(
        &mut self,
        num_stages: usize,
        spec: &ProcessSpec,
        filter_budget: usize,
    ) -> RotorResult<()> {
        let num_channels = spec.num_channels;
        let allocation_error = || RotorError::Allocation {
            stages: num_stages,
            channels: num_channels,
        };

        if num_stages.saturating_mul(num_channels) > filter_budget {
            return Err(RotorError::FilterBudgetExceeded {
                stages: num_stages,
                channels: num_channels,
                budget: filter_budget,
            });
        }

        // Reserve first so a failure leaves the topology consistent
        if num_stages > self.stages.len() {
            let additional = num_stages - self.stages.len();
            self.stages
                .try_reserve_exact(additional)
                .map_err(|_| allocation_error())?;
            self.coefficient_bank
                .try_reserve_exact(additional)
                .map_err(|_| allocation_error())?;
        }
        let kept = self.stages.len().min(num_stages);
        for stage in &mut self.stages[..kept] {
            if num_channels > stage.channels.len() {
                stage
                    .channels
                    .try_reserve_exact(num_channels - stage.channels.len())
                    .map_err(|_| allocation_error())?;
            }
        }

        self.stages.truncate(num_stages);
        self.coefficient_bank.truncate(num_stages);
        for stage in &mut self.stages {
            stage.channels.iter_mut().for_each(BiquadState::reset);
            stage.channels.resize(num_channels, BiquadState::new());
        }
        while self.stages.len() < num_stages {
            let mut channels = Vec::new();
            channels
                .try_reserve_exact(num_channels)
                .map_err(|_| allocation_error())?;
            channels.resize(num_channels, BiquadState::new());

            self.stages.push(FilterStage {
                coefficients: CoefficientId(self.coefficient_bank.len()),
                channels,
            });
            self.coefficient_bank.push(AllpassCoefficients::default());
        }

        self.num_channels = num_channels;
        self.spec = Some(*spec);
        self.initialized = false;
        Ok(())
    }

    /// Drop every stage and give the memory back
    pub fn release(&mut self) {
        self.stages = Vec::new();
        self.coefficient_bank = Vec::new();
        self.routing = CoefficientRouting::Shared;
        self.initialized = false;
    }

    /// Recompute coefficients for the current parameter values
    ///
    /// With `spread == 0` one coefficient set is computed and shared by all
    /// stages; otherwise each stage gets its own frequency from the spread
    /// distribution. Marks the cascade initialized either way.
    pub fn update_coefficients(
        &mut self,
        sample_rate: f32,
        frequency: f32,
        resonance: f32,
        spread: f32,
        curve: SpreadCurve,
    ) {
        if !self.stages.is_empty() {
            if spread == 0.0 {
                let frequency = clamp_frequency(frequency, sample_rate);
                self.coefficient_bank[CoefficientId::SHARED.index()] =
                    AllpassCoefficients::allpass(sample_rate, frequency, resonance);
                self.routing = CoefficientRouting::Shared;
            } else {
                let band = SpreadBand::new(frequency, spread, curve, sample_rate);
                let num_stages = self.stages.len();
                for (stage_idx, stage) in self.stages.iter().enumerate() {
                    self.coefficient_bank[stage.coefficients.index()] = AllpassCoefficients::allpass(
                        sample_rate,
                        band.stage_frequency(stage_idx, num_stages),
                        resonance,
                    );
                }
                self.routing = CoefficientRouting::PerStage;
            }
        }

        self.initialized = true;
    }

    /// Run one sample of one channel through every stage in order
    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: Sample) -> Sample {
        let shared = self.routing == CoefficientRouting::Shared;
        let mut sample = input;
        for stage in &mut self.stages {
            let id = if shared {
                CoefficientId::SHARED
            } else {
                stage.coefficients
            };
            sample = stage.channels[channel].process(sample, &self.coefficient_bank[id.index()]);
        }
        sample
    }

    /// Clear the history of every filter, keeping coefficients
    pub fn reset_history(&mut self) {
        for stage in &mut self.stages {
            for filter in &mut stage.channels {
                filter.reset();
            }
        }
    }

    /// Coefficients stage `stage_idx` currently reads
    pub fn coefficients_for(&self, stage_idx: usize) -> Option<&AllpassCoefficients> {
        let stage = self.stages.get(stage_idx)?;
        let id = match self.routing {
            CoefficientRouting::Shared => CoefficientId::SHARED,
            CoefficientRouting::PerStage => stage.coefficients,
        };
        self.coefficient_bank.get(id.index())
    }

    /// Check that every stage has a filter per channel and a valid handle
    pub fn is_consistent(&self) -> bool {
        self.coefficient_bank.len() == self.stages.len()
            && self.stages.iter().all(|stage| {
                stage.channels.len() == self.num_channels
                    && stage.coefficients.index() < self.coefficient_bank.len()
            })
    }

    /// The stages in application order
    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Number of stages (0 = pass-through)
    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    /// Number of per-channel filters in every stage
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Check if there are no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Check if coefficients have been computed since the last reconfiguration
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current coefficient routing
    pub fn routing(&self) -> CoefficientRouting {
        self.routing
    }

    /// The spec this cascade was last prepared for
    pub fn spec(&self) -> Option<&ProcessSpec> {
        self.spec.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: usize = 512 * 16;

    fn stereo() -> ProcessSpec {
        ProcessSpec::new(48_000.0, 512, 2)
    }

    #[test]
    fn test_reconfigure_grows_and_shrinks() {
        let mut cascade = FilterCascade::default();
        cascade.reconfigure(8, &stereo(), BUDGET).unwrap();
        assert_eq!(cascade.num_stages(), 8);
        assert!(cascade.is_consistent());
        assert!(!cascade.is_initialized());

        cascade.reconfigure(3, &stereo(), BUDGET).unwrap();
        assert_eq!(cascade.num_stages(), 3);
        assert!(cascade.is_consistent());

        cascade
            .reconfigure(5, &ProcessSpec::new(48_000.0, 512, 6), BUDGET)
            .unwrap();
        assert_eq!(cascade.num_channels(), 6);
        assert!(cascade.stages().iter().all(|s| s.num_channels() == 6));
        assert!(cascade.is_consistent());
    }

    #[test]
    fn test_handles_are_distinct_per_stage() {
        let mut cascade = FilterCascade::default();
        cascade.reconfigure(4, &stereo(), BUDGET).unwrap();
        let ids: Vec<usize> = cascade
            .stages()
            .iter()
            .map(|s| s.coefficient_id().index())
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_budget_rejected_without_touching_cascade() {
        let mut cascade = FilterCascade::default();
        cascade.reconfigure(4, &stereo(), BUDGET).unwrap();
        cascade.update_coefficients(48_000.0, 1_000.0, 0.5, 0.0, SpreadCurve::Logarithmic);

        let err = cascade.reconfigure(512, &ProcessSpec::new(48_000.0, 512, 32), BUDGET);
        assert!(matches!(err, Err(RotorError::FilterBudgetExceeded { .. })));
        assert_eq!(cascade.num_stages(), 4);
        assert!(cascade.is_initialized());
    }

    #[test]
    fn test_zero_spread_shares_first_stage() {
        let mut cascade = FilterCascade::default();
        cascade.reconfigure(4, &stereo(), BUDGET).unwrap();
        cascade.update_coefficients(48_000.0, 1_000.0, 0.5, 0.0, SpreadCurve::Logarithmic);

        assert_eq!(cascade.routing(), CoefficientRouting::Shared);
        assert!(cascade.is_initialized());
        let expected = AllpassCoefficients::allpass(48_000.0, 1_000.0, 0.5);
        for stage in 0..4 {
            assert_eq!(cascade.coefficients_for(stage), Some(&expected));
        }
    }

    #[test]
    fn test_spread_gives_each_stage_its_own_set() {
        let mut cascade = FilterCascade::default();
        cascade.reconfigure(4, &stereo(), BUDGET).unwrap();
        cascade.update_coefficients(48_000.0, 1_000.0, 0.5, 2_000.0, SpreadCurve::Linear);

        assert_eq!(cascade.routing(), CoefficientRouting::PerStage);
        let band = SpreadBand::new(1_000.0, 2_000.0, SpreadCurve::Linear, 48_000.0);
        for stage in 0..4 {
            let expected = AllpassCoefficients::allpass(48_000.0, band.stage_frequency(stage, 4), 0.5);
            assert_eq!(cascade.coefficients_for(stage), Some(&expected));
        }
    }

    #[test]
    fn test_empty_cascade_is_pass_through() {
        let mut cascade = FilterCascade::default();
        cascade.reconfigure(0, &stereo(), BUDGET).unwrap();
        cascade.update_coefficients(48_000.0, 1_000.0, 0.5, 0.0, SpreadCurve::Logarithmic);
        assert!(cascade.is_initialized());
        assert_eq!(cascade.process_sample(0, 0.25), 0.25);
    }

    #[test]
    fn test_channels_keep_separate_history() {
        let mut cascade = FilterCascade::default();
        cascade.reconfigure(2, &stereo(), BUDGET).unwrap();
        cascade.update_coefficients(48_000.0, 1_000.0, 0.5, 0.0, SpreadCurve::Logarithmic);

        let first_left = cascade.process_sample(0, 1.0);
        // Right channel has seen nothing yet, so an impulse gives the same output
        let first_right = cascade.process_sample(1, 1.0);
        assert_eq!(first_left, first_right);

        let second_left = cascade.process_sample(0, 0.0);
        assert_ne!(second_left, 0.0);
    }

    #[test]
    fn test_reconfigure_clears_kept_history() {
        let mut cascade = FilterCascade::default();
        cascade.reconfigure(4, &stereo(), BUDGET).unwrap();
        cascade.update_coefficients(48_000.0, 1_000.0, 20.0, 0.0, SpreadCurve::Logarithmic);
        for _ in 0..64 {
            cascade.process_sample(0, 1.0);
            cascade.process_sample(1, -1.0);
        }

        // Shrinking keeps stages 0 and 1, growing the channel count keeps
        // channels 0 and 1; none of them may still ring
        cascade
            .reconfigure(2, &ProcessSpec::new(48_000.0, 512, 3), BUDGET)
            .unwrap();
        cascade.update_coefficients(48_000.0, 1_000.0, 20.0, 0.0, SpreadCurve::Logarithmic);
        assert!(cascade
            .stages()
            .iter()
            .all(|stage| stage.channels.iter().all(|f| *f == BiquadState::new())));
        for channel in 0..3 {
            assert_eq!(cascade.process_sample(channel, 0.0), 0.0);
        }
    }

    #[test]
    fn test_reset_and_release() {
        let mut cascade = FilterCascade::default();
        cascade.reconfigure(2, &stereo(), BUDGET).unwrap();
        cascade.update_coefficients(48_000.0, 1_000.0, 0.5, 0.0, SpreadCurve::Logarithmic);
        cascade.process_sample(0, 1.0);

        cascade.reset_history();
        assert_eq!(cascade.process_sample(0, 0.0), 0.0);

        cascade.release();
        assert!(cascade.is_empty());
        assert!(cascade.is_consistent());
    }
}
