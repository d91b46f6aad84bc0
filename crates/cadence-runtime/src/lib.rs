//! Cadence Runtime - Host loop for cadence programs
//!
//! Ties the `cadence-core` building blocks into one scheduling cycle per
//! frame:
//! - [`Program`] - The application contract (init, update, step,
//!   subscriptions, view)
//! - [`Runtime`] - Owns the dispatch queue, subscription manager and clock
//! - [`RuntimeConfig`] - Settings supplied once at startup, loadable from RON
//! - [`testing::RecordingRenderer`] - Headless renderer for tests and demos
//!
//! ## Design Principles
//!
//! 1. **State belongs to the caller** - it is threaded through by value
//! 2. **Subscriptions are reconciled once per frame**, not once per tick
//! 3. **Slow frames are reported, not fatal** - see [`FrameReport::dropped_time`]

mod config;
mod error;
mod program;
mod runtime;
pub mod testing;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use program::{Program, StepContext, ViewContext};
pub use runtime::{FrameReport, Runtime};
