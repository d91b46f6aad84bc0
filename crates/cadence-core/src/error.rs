//! Error types for cadence-core

use crate::SubKey;
use thiserror::Error;

/// Core error type
///
/// Every variant is a configuration error. Slow frames and effect failures
/// are not reported here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("duplicate subscription key: {0}")]
    DuplicateSubscriptionKey(SubKey),

    #[error("invalid step size: {0} (must be finite and greater than zero)")]
    InvalidStepSize(f64),

    #[error("invalid max steps per frame: {0} (must be at least 1)")]
    InvalidMaxSteps(u32),

    #[error("invalid max frame delta: {0} (must be finite and greater than zero)")]
    InvalidMaxFrameDelta(f64),

    #[error("invalid time scale: {0} (must be finite and not negative)")]
    InvalidTimeScale(f64),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
