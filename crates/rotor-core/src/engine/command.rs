//! Lock-free command queue from the control side to the audio thread
//!
//! The controller pushes commands into an `rtrb` ring buffer; the audio
//! thread drains it at the start of every block, so parameter changes land
//! on block boundaries and never mid-block.
//!
//! # Real-Time Safety
//!
//! - **No allocations**: the ring is allocated once when the engine is built
//! - **Wait-free**: push and pop are O(1) and never block
//! - **Single-producer single-consumer**: controller → engine
//!
//! Stage-count changes do not travel through here. They need allocation and
//! go to the reconfiguration actor instead (see `reconfigure`).

use crate::params::SpreadCurve;

/// Commands sent from the control side to the audio thread
///
/// Every variant is `Copy` and a few bytes wide so the ring stays cache
/// friendly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    /// Set the center frequency target in Hz (smoothed)
    SetFrequency(f32),
    /// Set the resonance target (smoothed)
    SetResonance(f32),
    /// Set the spread width target in Hz (smoothed)
    SetSpread(f32),
    /// Switch the spread curve (takes effect immediately)
    SetSpreadCurve(SpreadCurve),
    /// Set the number of samples between coefficient recomputes
    SetSmoothingInterval(u32),
    /// Clear every filter's history (host transport stop)
    ResetFilters,
}

/// Default capacity of the command queue
///
/// A full parameter sweep sends five commands; 256 leaves room for dense
/// host automation between two audio blocks.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer/consumer pair)
///
/// Returns `(Producer, Consumer)` where:
/// - Producer: owned by the control side
/// - Consumer: owned by the audio thread
pub fn command_channel(
    capacity: usize,
) -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(capacity.max(1))
}
