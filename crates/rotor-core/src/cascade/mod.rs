//! Filter cascade and the double buffer it lives in
//!
//! - [`FilterCascade`]: ordered all-pass stages with per-channel history
//! - [`double_buffer`]: lock-free swap between the control and audio sides

mod double_buffer;
mod filters;

pub use double_buffer::{double_buffer, ActiveGuard, Reader, Writer};
pub use filters::{CoefficientId, CoefficientRouting, FilterCascade, FilterStage};

/// Control-side handle to the engine's cascades
pub type CascadeWriter = Writer<FilterCascade>;

/// Audio-side handle to the engine's cascades
pub type CascadeReader = Reader<FilterCascade>;
