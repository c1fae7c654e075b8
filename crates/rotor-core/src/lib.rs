//! Rotor Core - Real-time all-pass phase rotation
//!
//! Rotates the phase of an audio signal around a center frequency with a
//! cascade of up to 512 all-pass biquads per channel, without touching its
//! magnitude spectrum.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  EngineCommand (rtrb)   ┌──────────────────┐
//! │  RotorController │ ──────────────────────► │   AudioEngine    │
//! │  (control side)  │                         │  (audio thread)  │
//! └──────────────────┘                         └──────────────────┘
//!          │ ReconfigureCommand                         ▲
//!          ▼                                            │ Reader::get_active()
//! ┌──────────────────┐  modify_inactive_and_swap ┌──────┴───────────┐
//! │  Reconfigurator  │ ────────────────────────► │ DoubleBuffer of  │
//! │ (notification    │                           │  FilterCascade   │
//! │  actor thread)   │                           └──────────────────┘
//! └──────────────────┘
//! ```
//!
//! Smoothed parameters travel through the command ring; stage-count changes
//! allocate on the reconfiguration actor and are published with one atomic
//! index swap, so the audio thread never blocks, locks, or allocates.

pub mod cascade;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod params;
pub mod types;

pub use error::{RotorError, RotorResult};
pub use params::{RotorParams, SpreadCurve};
pub use types::*;

use config::RotorConfig;
use engine::{AudioEngine, RotorController};

/// Build a connected engine/controller pair
///
/// The [`AudioEngine`] is meant to be moved into the audio callback; the
/// [`RotorController`] stays on the control side. Both must be prepared with
/// the same [`ProcessSpec`] before the first block is processed.
pub fn create(config: &RotorConfig) -> (AudioEngine, RotorController) {
    let params = config.params.clamped();
    let (writer, reader) = cascade::double_buffer(
        cascade::FilterCascade::default(),
        cascade::FilterCascade::default(),
    );
    let (command_tx, command_rx) = engine::command_channel(config.engine.command_queue_capacity);

    let engine = AudioEngine::new(reader, command_rx, &config.engine, &params);
    let controller = RotorController::new(writer, command_tx, &config.engine, params);

    (engine, controller)
}
