//! The application contract driven by the runtime

use cadence_core::{Cmd, RenderBuffer, Sub, Tick};

/// An application: its state, messages and the pure functions over them
///
/// State is passed by value through `update` and `step` and returned; the
/// runtime never keeps a mutable reference to it between calls.
pub trait Program {
    /// Application state
    type State;
    /// Application message
    type Msg: Send + 'static;
    /// Snapshot of external input, read by `step`
    type Input;
    /// Render ordering key
    type SortKey: Ord;
    /// Opaque draw command handed to the renderer
    type Draw;

    /// Initial state and startup command
    fn init(&self) -> (Self::State, Cmd<Self::Msg>);

    /// Handle one message
    fn update(&self, state: Self::State, msg: Self::Msg) -> (Self::State, Cmd<Self::Msg>);

    /// Advance the simulation by one fixed step
    ///
    /// Usually built with a [`Pipeline`](cadence_core::Pipeline) of systems.
    fn step(
        &self,
        state: Self::State,
        _ctx: &StepContext<'_, Self::Input>,
    ) -> (Self::State, Cmd<Self::Msg>) {
        (state, Cmd::none())
    }

    /// External listeners wanted in the current state
    fn subscriptions(&self, _state: &Self::State) -> Sub<Self::Msg> {
        Sub::empty()
    }

    /// Record this frame's draw commands
    fn view(
        &self,
        state: &Self::State,
        ctx: &ViewContext,
        buffer: &mut RenderBuffer<Self::SortKey, Self::Draw>,
    );
}

/// What a fixed step can see besides the state
#[derive(Debug)]
pub struct StepContext<'a, I> {
    /// Input snapshot for the current frame
    pub input: &'a I,
    /// Number of the tick being simulated, starting at 1
    pub tick: Tick,
    /// Fixed step size, in seconds
    pub dt: f64,
}

/// What the view can see besides the state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewContext {
    /// Last simulated tick
    pub tick: Tick,
    /// Fraction of the next step already accumulated, for interpolation
    pub alpha: f64,
}
