//! Cascade reconfiguration off the audio thread
//!
//! Changing the stage count or the channel layout means allocating a new
//! set of filters. That happens here, on the inactive half of the double
//! buffer, and is published with a single atomic swap.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐  ReconfigureCommand  ┌──────────────────────────┐
//! │ RotorController│ ───────────────────► │  ReconfigurationService  │
//! │                │ ◄─────────────────── │  (background thread)     │
//! └────────────────┘  ReconfigureEvent    └──────────────────────────┘
//!                                                      │ Reconfigurator
//!                                                      ▼
//!                                          modify_inactive_and_swap
//! ```
//!
//! The service drains its queue before acting, so a burst of stage-count
//! changes costs one reconfiguration: only the newest value is applied.
//! With `background_reconfiguration` off the controller drives a
//! [`Reconfigurator`] inline instead.

use crossbeam::channel::{self, Receiver, Sender};
use std::thread;

use crate::cascade::{CascadeWriter, FilterCascade};
use crate::error::{RotorError, RotorResult};
use crate::types::ProcessSpec;

// ============================================================================
// Messages
// ============================================================================

/// Commands for the reconfiguration service
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconfigureCommand {
    /// Resize the cascade to this many stages
    SetFilterStages(usize),
    /// Rebuild both cascades for a new stream
    Prepare(ProcessSpec),
    /// Free both cascades
    Release,
    /// Stop the service thread
    Shutdown,
}

/// Outcome notifications published by the service
#[derive(Debug, Clone, PartialEq)]
pub enum ReconfigureEvent {
    /// A cascade with this topology is now active
    Applied { stages: usize, channels: usize },
    /// The request was rejected; the previous cascade keeps playing
    Failed { stages: usize, error: RotorError },
    /// Both cascades were released
    Released,
}

// ============================================================================
// Reconfigurator
// ============================================================================

/// Owns the control side of the cascade double buffer
///
/// Remembers the last stage count and spec so either can change on its own.
/// Until the first `prepare` there is no channel layout to build for, so
/// stage-count changes are only recorded.
pub struct Reconfigurator {
    writer: CascadeWriter,
    spec: Option<ProcessSpec>,
    stages: usize,
    filter_budget: usize,
}

impl Reconfigurator {
    /// Create a reconfigurator that will build `stages` stages on `prepare`
    pub fn new(writer: CascadeWriter, filter_budget: usize, stages: usize) -> Self {
        Self {
            writer,
            spec: None,
            stages,
            filter_budget,
        }
    }

    /// Resize to `stages` stages, keeping the current layout
    ///
    /// Returns `Ok(None)` if nothing was built because no spec is known yet.
    pub fn set_filter_stages(&mut self, stages: usize) -> RotorResult<Option<ReconfigureEvent>> {
        self.update(Some(stages), None)
    }

    /// Rebuild for a new stream, keeping the current stage count
    pub fn prepare(&mut self, spec: ProcessSpec) -> RotorResult<Option<ReconfigureEvent>> {
        self.update(None, Some(spec))
    }

    /// Apply a stage count and/or spec in one swap
    ///
    /// On failure nothing is published and the recorded state is unchanged,
    /// so the previously active cascade keeps playing.
    pub fn update(
        &mut self,
        stages: Option<usize>,
        spec: Option<ProcessSpec>,
    ) -> RotorResult<Option<ReconfigureEvent>> {
        if let Some(spec) = &spec {
            spec.validate()?;
        }
        let stages = stages.unwrap_or(self.stages);
        let Some(spec) = spec.or(self.spec) else {
            self.stages = stages;
            return Ok(None);
        };

        let budget = self.filter_budget;
        self.writer
            .try_modify_inactive_and_swap(|cascade| cascade.reconfigure(stages, &spec, budget))?;

        self.stages = stages;
        self.spec = Some(spec);
        log::info!(
            "Cascade reconfigured: {} stages x {} channels @ {} Hz",
            stages,
            spec.num_channels,
            spec.sample_rate
        );
        Ok(Some(ReconfigureEvent::Applied {
            stages,
            channels: spec.num_channels,
        }))
    }

    /// Free both cascades
    ///
    /// The stage count is kept so the next `prepare` rebuilds the same
    /// topology.
    pub fn release(&mut self) {
        self.writer.clear(FilterCascade::release);
        self.spec = None;
        log::info!("Cascades released");
    }

    /// Stage count of the last successful (or deferred) request
    pub fn stages(&self) -> usize {
        self.stages
    }

    /// Spec of the last successful prepare
    pub fn spec(&self) -> Option<&ProcessSpec> {
        self.spec.as_ref()
    }

    /// Number of swaps published so far
    pub fn swap_count(&self) -> u64 {
        self.writer.swap_count()
    }
}

// ============================================================================
// Service
// ============================================================================

/// Handle to a running [`ReconfigurationService`]
///
/// Dropping the handle shuts the service down and joins its thread.
pub struct ReconfigurationHandle {
    /// Channel for sending commands to the service
    command_tx: Sender<ReconfigureCommand>,
    /// Outcome of every processed request
    event_rx: Receiver<ReconfigureEvent>,
    /// Thread handle for the service
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl ReconfigurationHandle {
    /// Send a command to the service
    pub fn send(&self, cmd: ReconfigureCommand) -> RotorResult<()> {
        self.command_tx
            .send(cmd)
            .map_err(|_| RotorError::ServiceStopped)
    }

    /// Receiver for reconfiguration outcomes
    pub fn events(&self) -> &Receiver<ReconfigureEvent> {
        &self.event_rx
    }

    /// Check if the service is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the service and wait for it to exit
    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(ReconfigureCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Reconfiguration service panicked");
            }
        }
    }
}

impl Drop for ReconfigurationHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Background actor that performs reconfigurations
pub struct ReconfigurationService;

impl ReconfigurationService {
    /// Spawn the service in a background thread
    ///
    /// # Arguments
    /// * `reconfigurator` - Moved onto the service thread
    ///
    /// # Returns
    /// Handle for sending commands and receiving events
    pub fn spawn(reconfigurator: Reconfigurator) -> ReconfigurationHandle {
        let (command_tx, command_rx) = channel::unbounded();
        let (event_tx, event_rx) = channel::unbounded();

        let thread_handle = thread::Builder::new()
            .name("rotor-reconfigure".to_string())
            .spawn(move || Self::run(reconfigurator, command_rx, event_tx))
            .expect("Failed to spawn reconfiguration service");

        ReconfigurationHandle {
            command_tx,
            event_rx,
            thread_handle: Some(thread_handle),
        }
    }

    /// Main service loop
    fn run(
        mut reconfigurator: Reconfigurator,
        command_rx: Receiver<ReconfigureCommand>,
        event_tx: Sender<ReconfigureEvent>,
    ) {
        log::info!("ReconfigurationService started");

        while let Ok(first) = command_rx.recv() {
            // Coalesce everything already queued into at most one swap
            let mut stages = None;
            let mut spec = None;
            let mut shutdown = false;

            for cmd in std::iter::once(first).chain(command_rx.try_iter()) {
                match cmd {
                    ReconfigureCommand::SetFilterStages(n) => stages = Some(n),
                    ReconfigureCommand::Prepare(s) => spec = Some(s),
                    ReconfigureCommand::Release => {
                        Self::apply(&mut reconfigurator, stages.take(), spec.take(), &event_tx);
                        reconfigurator.release();
                        let _ = event_tx.send(ReconfigureEvent::Released);
                    }
                    ReconfigureCommand::Shutdown => {
                        shutdown = true;
                        break;
                    }
                }
            }

            Self::apply(&mut reconfigurator, stages, spec, &event_tx);
            if shutdown {
                break;
            }
        }

        log::info!("ReconfigurationService shutting down");
    }

    fn apply(
        reconfigurator: &mut Reconfigurator,
        stages: Option<usize>,
        spec: Option<ProcessSpec>,
        event_tx: &Sender<ReconfigureEvent>,
    ) {
        if stages.is_none() && spec.is_none() {
            return;
        }
        let requested = stages.unwrap_or(reconfigurator.stages());
        match reconfigurator.update(stages, spec) {
            Ok(Some(event)) => {
                let _ = event_tx.send(event);
            }
            Ok(None) => {}
            Err(error) => {
                log::error!("Reconfiguration to {} stages failed: {}", requested, error);
                let _ = event_tx.send(ReconfigureEvent::Failed {
                    stages: requested,
                    error,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{double_buffer, CascadeReader};
    use std::time::Duration;

    const BUDGET: usize = 512 * 16;
    const TIMEOUT: Duration = Duration::from_secs(5);

    fn setup(stages: usize) -> (Reconfigurator, CascadeReader) {
        let (writer, reader) = double_buffer(FilterCascade::default(), FilterCascade::default());
        (Reconfigurator::new(writer, BUDGET, stages), reader)
    }

    #[test]
    fn test_stages_deferred_until_prepare() {
        let (mut reconfigurator, mut reader) = setup(0);
        assert_eq!(reconfigurator.set_filter_stages(8).unwrap(), None);
        assert_eq!(reader.get_active().num_stages(), 0);

        let event = reconfigurator.prepare(ProcessSpec::default()).unwrap();
        assert_eq!(
            event,
            Some(ReconfigureEvent::Applied {
                stages: 8,
                channels: 2
            })
        );
        assert_eq!(reader.get_active().num_stages(), 8);
    }

    #[test]
    fn test_failed_request_keeps_active_cascade() {
        let (mut reconfigurator, mut reader) = setup(512);
        reconfigurator.prepare(ProcessSpec::default()).unwrap();
        let swaps = reconfigurator.swap_count();

        let err = reconfigurator
            .prepare(ProcessSpec::new(48_000.0, 512, 64))
            .unwrap_err();
        assert!(matches!(err, RotorError::FilterBudgetExceeded { .. }));
        assert_eq!(reconfigurator.swap_count(), swaps);
        assert_eq!(reconfigurator.spec().map(|s| s.num_channels), Some(2));

        let active = reader.get_active();
        assert_eq!(active.num_stages(), 512);
        assert_eq!(active.num_channels(), 2);
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let (mut reconfigurator, _reader) = setup(4);
        let err = reconfigurator
            .prepare(ProcessSpec::new(0.0, 512, 2))
            .unwrap_err();
        assert!(matches!(err, RotorError::InvalidSpec(_)));
    }

    #[test]
    fn test_release_empties_both_cascades() {
        let (mut reconfigurator, mut reader) = setup(16);
        reconfigurator.prepare(ProcessSpec::default()).unwrap();
        reconfigurator.set_filter_stages(32).unwrap();

        reconfigurator.release();
        assert!(reader.get_active().is_empty());
        assert_eq!(reconfigurator.stages(), 32);

        // The next prepare rebuilds the remembered stage count
        reconfigurator.prepare(ProcessSpec::default()).unwrap();
        assert_eq!(reader.get_active().num_stages(), 32);
    }

    #[test]
    fn test_service_applies_and_reports() {
        let (reconfigurator, mut reader) = setup(0);
        let handle = ReconfigurationService::spawn(reconfigurator);

        handle
            .send(ReconfigureCommand::Prepare(ProcessSpec::default()))
            .unwrap();
        let event = handle.events().recv_timeout(TIMEOUT).unwrap();
        assert_eq!(
            event,
            ReconfigureEvent::Applied {
                stages: 0,
                channels: 2
            }
        );

        handle.send(ReconfigureCommand::SetFilterStages(12)).unwrap();
        let event = handle.events().recv_timeout(TIMEOUT).unwrap();
        assert_eq!(
            event,
            ReconfigureEvent::Applied {
                stages: 12,
                channels: 2
            }
        );
        assert_eq!(reader.get_active().num_stages(), 12);
    }

    #[test]
    fn test_service_reports_failure() {
        let (reconfigurator, _reader) = setup(0);
        let handle = ReconfigurationService::spawn(reconfigurator);

        handle
            .send(ReconfigureCommand::Prepare(ProcessSpec::new(48_000.0, 512, 32)))
            .unwrap();
        handle.events().recv_timeout(TIMEOUT).unwrap();

        handle.send(ReconfigureCommand::SetFilterStages(512)).unwrap();
        match handle.events().recv_timeout(TIMEOUT).unwrap() {
            ReconfigureEvent::Failed { stages, error } => {
                assert_eq!(stages, 512);
                assert!(matches!(error, RotorError::FilterBudgetExceeded { .. }));
            }
            other => panic!("Expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_service_last_write_wins() {
        let (reconfigurator, mut reader) = setup(0);
        let handle = ReconfigurationService::spawn(reconfigurator);
        handle
            .send(ReconfigureCommand::Prepare(ProcessSpec::default()))
            .unwrap();
        handle.events().recv_timeout(TIMEOUT).unwrap();

        for stages in 1..=50 {
            handle.send(ReconfigureCommand::SetFilterStages(stages)).unwrap();
        }

        // Batches may split, but the last applied value is always the newest
        let mut last = None;
        while let Ok(event) = handle.events().recv_timeout(TIMEOUT) {
            if let ReconfigureEvent::Applied { stages, .. } = event {
                last = Some(stages);
                if stages == 50 {
                    break;
                }
            }
        }
        assert_eq!(last, Some(50));
        assert_eq!(reader.get_active().num_stages(), 50);
    }

    #[test]
    fn test_service_stops_on_drop() {
        let (reconfigurator, _reader) = setup(0);
        let mut handle = ReconfigurationService::spawn(reconfigurator);
        assert!(handle.is_running());
        handle.shutdown();
        assert!(!handle.is_running());
        assert_eq!(
            handle.send(ReconfigureCommand::Release),
            Err(RotorError::ServiceStopped)
        );
    }
}
