//! Error types for the control side of the engine
//!
//! The audio path has no failure modes; every variant here originates on the
//! control thread or the reconfiguration actor.

use thiserror::Error;

/// Errors that can occur while configuring the engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RotorError {
    /// The allocator refused to grow the cascade
    #[error("Failed to allocate cascade with {stages} stages x {channels} channels")]
    Allocation { stages: usize, channels: usize },

    /// The requested cascade exceeds the configured filter budget
    #[error("Cascade of {stages} stages x {channels} channels exceeds filter budget of {budget}")]
    FilterBudgetExceeded {
        stages: usize,
        channels: usize,
        budget: usize,
    },

    /// The host handed us an unusable processing spec
    #[error("Invalid process spec: {0}")]
    InvalidSpec(String),

    /// The control → audio command ring is full
    #[error("Engine command queue is full")]
    CommandQueueFull,

    /// The reconfiguration actor has shut down
    #[error("Reconfiguration service is not running")]
    ServiceStopped,
}

/// Result type for engine configuration
pub type RotorResult<T> = Result<T, RotorError>;
