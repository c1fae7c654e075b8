//! Main audio engine - drives the cascade from the audio thread
//!
//! Per block:
//! 1. Drain pending [`EngineCommand`]s into the latest control values
//! 2. Zero any output channels beyond the main bus
//! 3. Fetch the active cascade once
//! 4. Per sample: advance the smoothers, ask the scheduler whether to
//!    recompute coefficients, then run every stage over every channel
//!
//! Nothing in here blocks, locks, allocates or logs.

use crate::cascade::CascadeReader;
use crate::config::EngineConfig;
use crate::dsp::{SmoothedValue, SmoothingStyle};
use crate::error::RotorResult;
use crate::params::{RotorParams, SpreadCurve};
use crate::types::{AudioChannels, ProcessSpec};

use super::{EngineCommand, SmoothingScheduler};

/// The real-time half of the engine
///
/// Owns the audio-side handle of the cascade double buffer and the
/// consumer end of the command queue. Move it into the audio callback after
/// [`AudioEngine::prepare`].
pub struct AudioEngine {
    /// Audio-side view of the double-buffered cascade
    cascades: CascadeReader,
    /// Commands from the controller
    commands: rtrb::Consumer<EngineCommand>,
    /// Stream contract from the last `prepare`
    spec: ProcessSpec,
    /// Ramp length for every smoothed parameter
    smoothing_time_ms: f32,
    /// Latest control values received from the controller
    latest: RotorParams,
    frequency: SmoothedValue,
    resonance: SmoothedValue,
    spread: SmoothedValue,
    scheduler: SmoothingScheduler,
    /// Set by `ResetFilters`, consumed on the next block
    reset_pending: bool,
    /// Set by `prepare`: the next sample recomputes even an initialized cascade
    recompute_pending: bool,
    /// Number of coefficient recomputes performed
    coefficient_updates: u64,
}

impl AudioEngine {
    /// Create an engine resting at `params`
    pub fn new(
        cascades: CascadeReader,
        commands: rtrb::Consumer<EngineCommand>,
        config: &EngineConfig,
        params: &RotorParams,
    ) -> Self {
        Self {
            cascades,
            commands,
            spec: ProcessSpec::default(),
            smoothing_time_ms: config.smoothing_time_ms.max(0.0),
            latest: *params,
            frequency: SmoothedValue::new(SmoothingStyle::Logarithmic, params.frequency),
            resonance: SmoothedValue::new(SmoothingStyle::Linear, params.resonance),
            spread: SmoothedValue::new(SmoothingStyle::Linear, params.spread),
            scheduler: SmoothingScheduler::new(params.smoothing_interval),
            reset_pending: false,
            recompute_pending: true,
            coefficient_updates: 0,
        }
    }

    /// Prepare for a new stream
    ///
    /// Call from the control side before the first `process`, and again
    /// whenever the sample rate or bus layout changes. Snaps every smoother
    /// to the latest control value so the stream starts without a ramp, and
    /// forces a coefficient recompute on the first sample processed.
    pub fn prepare(&mut self, spec: ProcessSpec) -> RotorResult<()> {
        spec.validate()?;
        self.drain_commands();
        self.spec = spec;

        for (smoother, value) in [
            (&mut self.frequency, self.latest.frequency),
            (&mut self.resonance, self.latest.resonance),
            (&mut self.spread, self.latest.spread),
        ] {
            smoother.reset(spec.sample_rate, self.smoothing_time_ms);
            smoother.set_current_and_target(value);
        }
        self.scheduler.set_interval(self.latest.smoothing_interval);
        self.scheduler.reset();
        self.recompute_pending = true;
        Ok(())
    }

    /// Process one block in place
    ///
    /// Channels beyond the prepared main bus are zero-filled. If the active
    /// cascade was built for fewer channels than the buffer carries (a bus
    /// change whose reconfiguration has not landed yet), the extra main-bus
    /// channels pass through unprocessed for that block.
    pub fn process<B>(&mut self, buffer: &mut B)
    where
        B: AudioChannels + ?Sized,
    {
        self.drain_commands();

        let num_samples = buffer.num_samples();
        let num_channels = buffer.num_channels();
        let main_channels = num_channels.min(self.spec.num_channels);
        for channel in main_channels..num_channels {
            buffer.channel_mut(channel)[..num_samples].fill(0.0);
        }

        self.frequency.set_target(self.latest.frequency);
        self.resonance.set_target(self.latest.resonance);
        self.spread.set_target(self.latest.spread);
        let curve = self.latest.spread_curve;
        let sample_rate = self.spec.sample_rate;

        let mut cascade = self.cascades.get_active();
        if self.reset_pending {
            cascade.reset_history();
            self.reset_pending = false;
        }
        let processed_channels = main_channels.min(cascade.num_channels());

        for sample_idx in 0..num_samples {
            let ramping = self.frequency.is_smoothing()
                || self.resonance.is_smoothing()
                || self.spread.is_smoothing();
            let frequency = self.frequency.next();
            let resonance = self.resonance.next();
            let spread = self.spread.next();

            let initialized = cascade.is_initialized() && !self.recompute_pending;
            if self.scheduler.should_recompute(ramping, initialized, curve) {
                self.recompute_pending = false;
                if !cascade.is_empty() {
                    self.coefficient_updates += 1;
                }
                cascade.update_coefficients(sample_rate, frequency, resonance, spread, curve);
            }

            if cascade.is_empty() {
                continue;
            }
            for channel in 0..processed_channels {
                let sample = &mut buffer.channel_mut(channel)[sample_idx];
                *sample = cascade.process_sample(channel, *sample);
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                EngineCommand::SetFrequency(frequency) => self.latest.frequency = frequency,
                EngineCommand::SetResonance(resonance) => self.latest.resonance = resonance,
                EngineCommand::SetSpread(spread) => self.latest.spread = spread,
                EngineCommand::SetSpreadCurve(curve) => self.latest.spread_curve = curve,
                EngineCommand::SetSmoothingInterval(interval) => {
                    self.latest.smoothing_interval = interval;
                    self.scheduler.set_interval(interval);
                }
                EngineCommand::ResetFilters => self.reset_pending = true,
            }
        }
    }

    /// Number of coefficient recomputes since the engine was created
    pub fn coefficient_updates(&self) -> u64 {
        self.coefficient_updates
    }

    /// Latest control values the engine has received
    ///
    /// `filter_stages` is not tracked here; see [`AudioEngine::active_stages`].
    pub fn params(&self) -> &RotorParams {
        &self.latest
    }

    /// Stage count of the currently active cascade
    pub fn active_stages(&mut self) -> usize {
        self.cascades.get_active().num_stages()
    }

    /// Current spread curve
    pub fn spread_curve(&self) -> SpreadCurve {
        self.latest.spread_curve
    }

    /// The spec from the last `prepare`
    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// Tail length in samples
    ///
    /// All-pass filters ring, but the engine reports no tail: the signal
    /// energy is unchanged and hosts should not keep processing silence.
    pub fn tail_samples(&self) -> usize {
        0
    }
}
