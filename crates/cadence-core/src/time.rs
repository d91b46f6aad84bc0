//! Fixed time step scheduling
//!
//! Converts variable wall-clock frame deltas into a deterministic number of
//! constant-size simulation ticks:
//! - `FixedStepConfig` - Step size and the two overrun guards
//! - `fixed_step` - The pure accumulator function
//! - `Clock` - Carries the accumulator and tick count across frames

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A discrete tick identifier (logical time unit)
pub type Tick = u64;

/// Fixed-step scheduler settings, immutable once validated
///
/// # Example
///
/// ```
/// use cadence_core::time::FixedStepConfig;
///
/// let config = FixedStepConfig::new(0.1, 10, 1.0).unwrap();
/// assert_eq!(config.max_steps(), 10);
///
/// // Zero step size is rejected up front
/// assert!(FixedStepConfig::new(0.0, 10, 1.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedStepConfig {
    /// Simulated seconds per tick
    step: f64,
    /// Most ticks run for a single frame
    max_steps: u32,
    /// Largest frame delta accepted, in seconds
    max_frame_delta: f64,
}

impl FixedStepConfig {
    /// Create a validated configuration
    pub fn new(step: f64, max_steps: u32, max_frame_delta: f64) -> Result<Self> {
        let config = Self {
            step,
            max_steps,
            max_frame_delta,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants (needed after deserializing)
    pub fn validate(&self) -> Result<()> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(Error::InvalidStepSize(self.step));
        }
        if self.max_steps == 0 {
            return Err(Error::InvalidMaxSteps(self.max_steps));
        }
        if !self.max_frame_delta.is_finite() || self.max_frame_delta <= 0.0 {
            return Err(Error::InvalidMaxFrameDelta(self.max_frame_delta));
        }
        Ok(())
    }

    /// Simulated seconds per tick
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Most ticks run for a single frame
    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Largest frame delta accepted, in seconds
    pub fn max_frame_delta(&self) -> f64 {
        self.max_frame_delta
    }

    /// Run [`fixed_step`] with these settings
    pub fn advance(&self, accumulator: f64, dt: f64) -> StepOutcome {
        fixed_step(self.step, self.max_steps, self.max_frame_delta, accumulator, dt)
    }
}

impl Default for FixedStepConfig {
    /// 60 ticks per second, at most 5 per frame, frames capped at 250ms
    fn default() -> Self {
        Self {
            step: 1.0 / 60.0,
            max_steps: 5,
            max_frame_delta: 0.25,
        }
    }
}

/// Result of scheduling one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Unconsumed time carried to the next frame
    pub accumulator: f64,
    /// Ticks to run this frame
    pub steps: u32,
    /// Whether excess time was thrown away
    pub dropped: bool,
}

/// Schedule one frame
///
/// `dt` is clamped to `[0, max_frame_delta]` (non-finite deltas count as 0)
/// and added to `accumulator`. If more than `max_steps` whole steps fit, only
/// `max_steps` run, the accumulator resets to zero and `dropped` is set.
///
/// Total and side-effect free; configuration is checked by
/// [`FixedStepConfig::new`], not here.
///
/// # Example
///
/// ```
/// use cadence_core::time::fixed_step;
///
/// let outcome = fixed_step(0.1, 2, 10.0, 0.0, 0.35);
/// assert_eq!(outcome.steps, 2);
/// assert!(outcome.dropped);
/// assert_eq!(outcome.accumulator, 0.0);
/// ```
pub fn fixed_step(
    step: f64,
    max_steps: u32,
    max_frame_delta: f64,
    accumulator: f64,
    dt: f64,
) -> StepOutcome {
    let dt = if dt.is_finite() && dt > 0.0 {
        dt.min(max_frame_delta)
    } else {
        0.0
    };
    let total = accumulator + dt;
    let whole = (total / step).floor();

    if whole > f64::from(max_steps) {
        StepOutcome {
            accumulator: 0.0,
            steps: max_steps,
            dropped: true,
        }
    } else {
        let steps = whole as u32;
        StepOutcome {
            accumulator: total - f64::from(steps) * step,
            steps,
            dropped: false,
        }
    }
}

/// Simulation clock state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clock {
    config: FixedStepConfig,
    /// Unconsumed simulation time, in seconds
    accumulator: f64,
    /// Ticks run so far
    tick: Tick,
    paused: bool,
    /// Multiplier applied to every frame delta before clamping
    time_scale: f64,
}

impl Clock {
    /// Create a new clock
    pub fn new(config: FixedStepConfig) -> Self {
        Self {
            config,
            accumulator: 0.0,
            tick: 0,
            paused: false,
            time_scale: 1.0,
        }
    }

    /// Schedule a frame of `dt` wall-clock seconds
    ///
    /// A paused clock runs no steps and keeps its accumulator.
    pub fn advance(&mut self, dt: f64) -> StepOutcome {
        if self.paused {
            return StepOutcome {
                accumulator: self.accumulator,
                steps: 0,
                dropped: false,
            };
        }

        let outcome = self.config.advance(self.accumulator, dt * self.time_scale);
        self.accumulator = outcome.accumulator;
        if outcome.dropped {
            tracing::warn!(
                dt,
                steps = outcome.steps,
                tick = self.tick,
                "frame overran the step budget, dropping simulation time"
            );
        }
        outcome
    }

    /// Record that one tick has been simulated
    pub fn advance_tick(&mut self) -> Tick {
        self.tick += 1;
        self.tick
    }

    /// Ticks run so far
    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// How far the simulation is into the next step, in `[0, 1)`
    pub fn alpha(&self) -> f64 {
        self.accumulator / self.config.step()
    }

    /// Seconds simulated so far
    pub fn elapsed(&self) -> f64 {
        self.tick as f64 * self.config.step()
    }

    /// The scheduler settings
    pub fn config(&self) -> &FixedStepConfig {
        &self.config
    }

    /// Check if the clock is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause or resume
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Toggle pause, returning the new state
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Current time scale
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Speed simulated time up or slow it down
    pub fn set_time_scale(&mut self, scale: f64) -> Result<()> {
        if !scale.is_finite() || scale < 0.0 {
            return Err(Error::InvalidTimeScale(scale));
        }
        self.time_scale = scale;
        Ok(())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(FixedStepConfig::default())
    }
}
