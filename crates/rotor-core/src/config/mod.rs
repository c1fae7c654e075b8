//! Engine configuration
//!
//! Two layers, both persisted as YAML:
//!
//! - [`EngineConfig`]: how the engine runs (ramp length, queue size, limits)
//! - [`RotorParams`]: the control values it starts from
//!
//! ```yaml
//! engine:
//!   smoothing_time_ms: 50.0
//!   command_queue_capacity: 256
//!   max_filters: 8192
//!   background_reconfiguration: true
//! params:
//!   filter_stages: 64
//!   frequency: 800.0
//!   resonance: 0.7
//!   spread: 0.0
//!   spread_curve: logarithmic
//!   smoothing_interval: 16
//! ```
//!
//! Missing keys fall back to their defaults.

mod io;
mod paths;

pub use io::{load_config, save_config, try_load_config};
pub use paths::{config_dir, default_config_path, CONFIG_FILENAME};

use serde::{Deserialize, Serialize};

use crate::engine::COMMAND_QUEUE_CAPACITY;
use crate::params::RotorParams;
use crate::types::MAX_STAGES;

/// Default ramp length of every smoothed parameter
pub const DEFAULT_SMOOTHING_TIME_MS: f32 = 50.0;

/// Default channel count the filter budget is sized for
const BUDGET_CHANNELS: usize = 16;

/// Runtime settings of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ramp length in milliseconds for frequency, resonance and spread
    pub smoothing_time_ms: f32,
    /// Capacity of the control → audio command ring
    pub command_queue_capacity: usize,
    /// Upper bound on stages × channels a reconfiguration may build
    pub max_filters: usize,
    /// Reconfigure on a background thread (`false`: on the caller)
    pub background_reconfiguration: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_time_ms: DEFAULT_SMOOTHING_TIME_MS,
            command_queue_capacity: COMMAND_QUEUE_CAPACITY,
            max_filters: MAX_STAGES * BUDGET_CHANNELS,
            background_reconfiguration: true,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotorConfig {
    pub engine: EngineConfig,
    pub params: RotorParams,
}
