//! Control-side façade
//!
//! [`RotorController`] is what a host adapter or UI talks to. It keeps the
//! last published [`RotorParams`], and on every update sends only what
//! changed: smoothed values and flags go to the audio thread over the
//! command ring, stage-count changes go to the reconfiguration backend.
//!
//! The published stage count only moves once a cascade with that many stages
//! is actually live: inline it is updated when the swap succeeds, with the
//! background service when an [`ReconfigureEvent::Applied`] event is read.

use std::time::Duration;

use crossbeam::channel::RecvTimeoutError;

use crate::cascade::CascadeWriter;
use crate::config::EngineConfig;
use crate::error::{RotorError, RotorResult};
use crate::params::{RotorParams, SpreadCurve};
use crate::types::ProcessSpec;

use super::reconfigure::{
    ReconfigurationHandle, ReconfigurationService, ReconfigureCommand, ReconfigureEvent,
    Reconfigurator,
};
use super::EngineCommand;

/// Where stage-count changes are carried out
enum Backend {
    /// On the caller's thread
    Inline(Reconfigurator),
    /// On the reconfiguration service thread
    Service(ReconfigurationHandle),
}

/// Control-side handle to a running engine
pub struct RotorController {
    commands: rtrb::Producer<EngineCommand>,
    backend: Backend,
    /// Values the audio thread has been told about
    published: RotorParams,
}

impl RotorController {
    /// Create a controller for the engine sharing `writer` and `commands`
    ///
    /// `params` must be the values the engine was created with.
    pub fn new(
        writer: CascadeWriter,
        commands: rtrb::Producer<EngineCommand>,
        config: &EngineConfig,
        params: RotorParams,
    ) -> Self {
        let reconfigurator =
            Reconfigurator::new(writer, config.max_filters, params.filter_stages as usize);
        let backend = if config.background_reconfiguration {
            Backend::Service(ReconfigurationService::spawn(reconfigurator))
        } else {
            Backend::Inline(reconfigurator)
        };

        Self {
            commands,
            backend,
            published: params,
        }
    }

    /// Build both cascades for a new stream
    ///
    /// With the background service this only queues the request; read
    /// [`RotorController::poll_events`] for the outcome.
    pub fn prepare(&mut self, spec: ProcessSpec) -> RotorResult<()> {
        spec.validate()?;
        log::info!(
            "Preparing rotor: {} Hz, {} channels, max block {}",
            spec.sample_rate,
            spec.num_channels,
            spec.max_block_size
        );
        self.reconfigure(ReconfigureCommand::Prepare(spec))
    }

    /// Free both cascades (stream stopped)
    pub fn release(&mut self) -> RotorResult<()> {
        self.reconfigure(ReconfigureCommand::Release)
    }

    /// Publish a new set of control values
    ///
    /// Values are clamped into range first. Only fields that differ from the
    /// last published set are sent. If the command ring is full the fields
    /// that did not fit stay unpublished, so calling again retries them.
    pub fn set_params(&mut self, params: &RotorParams) -> RotorResult<()> {
        let params = params.clamped();
        let published = self.published;
        let mut result = Ok(());

        if params.frequency != published.frequency {
            Self::keep_first_error(
                &mut result,
                self.push(EngineCommand::SetFrequency(params.frequency))
                    .map(|()| self.published.frequency = params.frequency),
            );
        }
        if params.resonance != published.resonance {
            Self::keep_first_error(
                &mut result,
                self.push(EngineCommand::SetResonance(params.resonance))
                    .map(|()| self.published.resonance = params.resonance),
            );
        }
        if params.spread != published.spread {
            Self::keep_first_error(
                &mut result,
                self.push(EngineCommand::SetSpread(params.spread))
                    .map(|()| self.published.spread = params.spread),
            );
        }
        if params.spread_curve != published.spread_curve {
            Self::keep_first_error(
                &mut result,
                self.push(EngineCommand::SetSpreadCurve(params.spread_curve))
                    .map(|()| self.published.spread_curve = params.spread_curve),
            );
        }
        if params.smoothing_interval != published.smoothing_interval {
            Self::keep_first_error(
                &mut result,
                self.push(EngineCommand::SetSmoothingInterval(params.smoothing_interval))
                    .map(|()| self.published.smoothing_interval = params.smoothing_interval),
            );
        }
        if params.filter_stages != published.filter_stages {
            Self::keep_first_error(&mut result, self.set_filter_stages(params.filter_stages));
        }

        result
    }

    /// Change the number of all-pass stages (clamped to the maximum)
    ///
    /// Inline, [`RotorController::params`] reflects the new count as soon as
    /// this returns `Ok`. With the background service it changes only when
    /// the matching `Applied` event is read.
    pub fn set_filter_stages(&mut self, stages: u32) -> RotorResult<()> {
        let stages = RotorParams {
            filter_stages: stages,
            ..self.published
        }
        .clamped()
        .filter_stages;

        self.reconfigure(ReconfigureCommand::SetFilterStages(stages as usize))?;
        if let Backend::Inline(_) = self.backend {
            self.published.filter_stages = stages;
        }
        Ok(())
    }

    /// Set the center frequency in Hz
    pub fn set_frequency(&mut self, frequency: f32) -> RotorResult<()> {
        self.set_params(&RotorParams {
            frequency,
            ..self.published
        })
    }

    /// Set the resonance (Q)
    pub fn set_resonance(&mut self, resonance: f32) -> RotorResult<()> {
        self.set_params(&RotorParams {
            resonance,
            ..self.published
        })
    }

    /// Set the spread width in Hz
    pub fn set_spread(&mut self, spread: f32) -> RotorResult<()> {
        self.set_params(&RotorParams {
            spread,
            ..self.published
        })
    }

    /// Switch between linear and logarithmic stage distribution
    pub fn set_spread_curve(&mut self, spread_curve: SpreadCurve) -> RotorResult<()> {
        self.set_params(&RotorParams {
            spread_curve,
            ..self.published
        })
    }

    /// Clear every filter's history on the next block
    pub fn reset_filters(&mut self) -> RotorResult<()> {
        self.push(EngineCommand::ResetFilters)
    }

    /// Last published control values
    pub fn params(&self) -> &RotorParams {
        &self.published
    }

    /// Drain reconfiguration outcomes reported by the background service
    ///
    /// Always empty with the inline backend, whose outcomes are returned
    /// directly.
    pub fn poll_events(&mut self) -> Vec<ReconfigureEvent> {
        let events: Vec<_> = match &self.backend {
            Backend::Service(handle) => handle.events().try_iter().collect(),
            Backend::Inline(_) => Vec::new(),
        };
        events.iter().for_each(|event| self.observe(event));
        events
    }

    /// Block up to `timeout` for the next reconfiguration outcome
    pub fn wait_event(&mut self, timeout: Duration) -> Option<ReconfigureEvent> {
        let event = match &self.backend {
            Backend::Service(handle) => match handle.events().recv_timeout(timeout) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("Reconfiguration service stopped");
                    return None;
                }
            },
            Backend::Inline(_) => return None,
        };
        self.observe(&event);
        Some(event)
    }

    fn observe(&mut self, event: &ReconfigureEvent) {
        match event {
            ReconfigureEvent::Applied { stages, .. } => {
                self.published.filter_stages = *stages as u32;
            }
            ReconfigureEvent::Failed { stages, error } => {
                log::error!("Reconfiguration to {} stages failed: {}", stages, error);
            }
            ReconfigureEvent::Released => {}
        }
    }

    fn push(&mut self, command: EngineCommand) -> RotorResult<()> {
        self.commands.push(command).map_err(|_| {
            log::warn!("Engine command queue full, dropping {:?}", command);
            RotorError::CommandQueueFull
        })
    }

    fn reconfigure(&mut self, command: ReconfigureCommand) -> RotorResult<()> {
        match &mut self.backend {
            Backend::Service(handle) => handle.send(command),
            Backend::Inline(reconfigurator) => {
                let result = match command {
                    ReconfigureCommand::SetFilterStages(stages) => {
                        reconfigurator.set_filter_stages(stages).map(drop)
                    }
                    ReconfigureCommand::Prepare(spec) => reconfigurator.prepare(spec).map(drop),
                    ReconfigureCommand::Release => {
                        reconfigurator.release();
                        Ok(())
                    }
                    ReconfigureCommand::Shutdown => Ok(()),
                };
                if let Err(error) = &result {
                    log::error!("Reconfiguration failed: {}", error);
                }
                result
            }
        }
    }

    fn keep_first_error(result: &mut RotorResult<()>, next: RotorResult<()>) {
        if result.is_ok() {
            *result = next;
        }
    }
}
