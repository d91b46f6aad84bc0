//! Error types for cadence-runtime

use thiserror::Error;

/// Result type for cadence-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cadence-runtime
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid settings or a misconfigured subscription tree
    #[error("core error: {0}")]
    Core(#[from] cadence_core::Error),

    /// Configuration text that does not parse
    #[error("config error: {0}")]
    Config(#[from] ron::error::SpannedError),
}

impl Error {
    /// Get the core error, if this wraps one
    pub fn core(&self) -> Option<&cadence_core::Error> {
        match self {
            Error::Core(err) => Some(err),
            _ => None,
        }
    }
}

// Compile-time check that Error is Send + Sync for thread-safe error propagation.
// This function is never called but will fail to compile if the bound is not satisfied.
fn _assert_error_send_sync<T: Send + Sync>() {}
fn _error_is_send_sync() {
    _assert_error_send_sync::<Error>();
}
