//! Engine: the audio-thread orchestrator and its control side
//!
//! - [`AudioEngine`]: runs on the audio thread, never blocks or allocates
//! - [`RotorController`]: control-side façade, diffs and publishes parameters
//! - [`Reconfigurator`] / [`ReconfigurationService`]: stage-count changes
//! - [`SmoothingScheduler`]: decides when coefficients are recomputed

mod command;
mod controller;
#[allow(clippy::module_inception)]
mod engine;
mod reconfigure;
mod scheduler;

pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use controller::RotorController;
pub use engine::AudioEngine;
pub use reconfigure::{
    ReconfigurationHandle, ReconfigurationService, ReconfigureCommand, ReconfigureEvent,
    Reconfigurator,
};
pub use scheduler::SmoothingScheduler;
