//! Cadence Core - Building blocks for Elm-style real-time loops
//!
//! This crate provides the pieces a game loop is assembled from:
//! - Commands and effects (`Cmd`, `Effect`) produced by updates
//! - Keyed subscriptions to external listeners (`Sub`, `SubscriptionManager`)
//! - The batching message mailbox (`DispatchQueue`, `Dispatch`)
//! - Fixed time step scheduling (`fixed_step`, `Clock`)
//! - The update pipeline combinator (`Pipeline`)
//! - Sorted deferred draw commands (`RenderBuffer`, `Frame`)
//!
//! Everything is generic over the message and draw command types; the host
//! loop that ties them together lives in `cadence-runtime`.
//!
//! ## Ordering guarantees
//!
//! - Effects of a command run in left-to-right order, however batches nest
//! - Messages drain FIFO within a batch
//! - Pipeline systems run once each, in registration order
//! - Draw commands with equal sort keys keep insertion order

mod cmd;
pub mod dispatch;
mod error;
mod pipeline;
pub mod render;
pub mod sub;
pub mod time;

pub use cmd::{Cmd, Effect};
pub use dispatch::{Dispatch, DispatchMode, DispatchQueue};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use render::{Frame, RenderBuffer, Renderer};
pub use sub::{diff, Disposer, Listener, Sub, SubDiff, SubKey, SubscriptionManager};
pub use time::{fixed_step, Clock, FixedStepConfig, StepOutcome, Tick};
