//! Runtime Configuration - Time step, dispatch policy and time scale
//!
//! Settings are supplied once, before the runtime is created, and never
//! change afterwards. They can be built in code or read from RON text:
//!
//! ```text
//! (
//!     timestep: (step: 0.016666, max_steps: 5, max_frame_delta: 0.25),
//!     dispatch_mode: FrameBounded,
//!     time_scale: 1.0,
//! )
//! ```
//!
//! Missing fields fall back to their defaults.

use crate::Result;
use cadence_core::{DispatchMode, FixedStepConfig};
use serde::{Deserialize, Serialize};

/// Configuration for a [`Runtime`](crate::Runtime)
///
/// # Example
///
/// ```
/// use cadence_runtime::RuntimeConfig;
/// use cadence_core::DispatchMode;
///
/// let config = RuntimeConfig::from_ron_str("(dispatch_mode: Immediate)").unwrap();
/// assert_eq!(config.dispatch_mode, DispatchMode::Immediate);
/// assert_eq!(config.time_scale, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fixed-step scheduler settings
    pub timestep: FixedStepConfig,
    /// Re-entrancy policy of the dispatch queue
    pub dispatch_mode: DispatchMode,
    /// Multiplier applied to every frame delta
    pub time_scale: f64,
}

impl RuntimeConfig {
    /// Parse and validate RON text
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every setting
    pub fn validate(&self) -> Result<()> {
        self.timestep.validate()?;
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(cadence_core::Error::InvalidTimeScale(self.time_scale).into());
        }
        Ok(())
    }

    /// Replace the scheduler settings
    pub fn with_timestep(mut self, timestep: FixedStepConfig) -> Self {
        self.timestep = timestep;
        self
    }

    /// Replace the dispatch policy
    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    /// Replace the time scale
    pub fn with_time_scale(mut self, scale: f64) -> Self {
        self.time_scale = scale;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            timestep: FixedStepConfig::default(),
            dispatch_mode: DispatchMode::default(),
            time_scale: 1.0,
        }
    }
}
