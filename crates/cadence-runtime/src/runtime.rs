//! Host-loop runtime for a [`Program`]
//!
//! One call to [`Runtime::frame`] is one scheduling cycle:
//!
//! ```text
//! reconcile subscriptions (once per frame)
//! clock decides N ticks
//! for each tick:
//!     start batch
//!     drain: update(msg), execute its command
//!     step(input), execute its command
//!     drain again (Immediate-mode follow-ups)
//!     end batch
//! view into a fresh RenderBuffer → sort → submit
//! ```

use crate::{Program, Result, RuntimeConfig, StepContext, ViewContext};
use cadence_core::{
    Clock, Dispatch, DispatchMode, DispatchQueue, RenderBuffer, Renderer, SubDiff,
    SubscriptionManager, Tick,
};

/// What happened during one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Ticks simulated
    pub steps: u32,
    /// Whether simulation time was thrown away to stay within budget
    pub dropped_time: bool,
    /// Messages handled across all ticks
    pub messages: usize,
    /// Draw commands submitted
    pub draw_commands: usize,
    /// Last simulated tick
    pub tick: Tick,
    /// Interpolation factor passed to the view
    pub alpha: f64,
    /// Listeners started this frame
    pub subscriptions_started: usize,
    /// Listeners stopped this frame
    pub subscriptions_stopped: usize,
}

/// Drives a [`Program`]
///
/// The application state is owned by the caller and threaded through
/// [`init`](Self::init) and [`frame`](Self::frame) by value.
pub struct Runtime<P: Program> {
    program: P,
    queue: DispatchQueue<P::Msg>,
    dispatch: Dispatch<P::Msg>,
    subscriptions: SubscriptionManager<P::Msg>,
    clock: Clock,
}

impl<P: Program> Runtime<P> {
    /// Create a runtime, validating `config`
    pub fn new(program: P, config: RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let mut clock = Clock::new(config.timestep);
        clock.set_time_scale(config.time_scale)?;

        let queue = DispatchQueue::new(config.dispatch_mode);
        let dispatch = queue.dispatcher();
        let subscriptions = SubscriptionManager::new(dispatch.clone());

        Ok(Self {
            program,
            queue,
            dispatch,
            subscriptions,
            clock,
        })
    }

    /// Build the initial state
    ///
    /// Runs the startup command and starts the initial subscriptions, so a
    /// duplicate subscription key surfaces here rather than mid-game.
    pub fn init(&mut self) -> Result<P::State> {
        let (state, cmd) = self.program.init();
        cmd.execute(&self.dispatch);
        self.reconcile(&state)?;
        Ok(state)
    }

    /// Run one scheduling cycle of `dt` wall-clock seconds
    pub fn frame<R>(
        &mut self,
        state: P::State,
        dt: f64,
        input: &P::Input,
        renderer: &mut R,
    ) -> Result<(P::State, FrameReport)>
    where
        R: Renderer<P::SortKey, P::Draw>,
    {
        let changes = self.reconcile(&state)?;
        let outcome = self.clock.advance(dt);

        let mut state = state;
        let mut messages = 0;
        for _ in 0..outcome.steps {
            let tick = self.clock.advance_tick();
            let (next, handled) = self.run_tick(state, tick, input);
            state = next;
            messages += handled;
        }

        let view = ViewContext {
            tick: self.clock.tick(),
            alpha: self.clock.alpha(),
        };
        let mut buffer = RenderBuffer::new();
        self.program.view(&state, &view, &mut buffer);
        let draw_commands = buffer.submit(renderer);
        tracing::trace!(tick = view.tick, draw_commands, "frame submitted");

        let report = FrameReport {
            steps: outcome.steps,
            dropped_time: outcome.dropped,
            messages,
            draw_commands,
            tick: view.tick,
            alpha: view.alpha,
            subscriptions_started: changes.to_start.len(),
            subscriptions_stopped: changes.to_stop.len(),
        };
        Ok((state, report))
    }

    fn run_tick(&self, state: P::State, tick: Tick, input: &P::Input) -> (P::State, usize) {
        self.queue.start_batch();
        let (state, before) = self.drain(state);

        let ctx = StepContext {
            input,
            tick,
            dt: self.clock.config().step(),
        };
        let (state, cmd) = self.program.step(state, &ctx);
        cmd.execute(&self.dispatch);

        let (state, after) = self.drain(state);
        self.queue.end_batch();
        tracing::trace!(tick, messages = before + after, "tick simulated");
        (state, before + after)
    }

    fn drain(&self, state: P::State) -> (P::State, usize) {
        let mut state = state;
        let mut handled = 0;
        while let Some(msg) = self.queue.try_dequeue() {
            let (next, cmd) = self.program.update(state, msg);
            state = next;
            cmd.execute(&self.dispatch);
            handled += 1;
        }
        (state, handled)
    }

    fn reconcile(&mut self, state: &P::State) -> Result<SubDiff> {
        let sub = self.program.subscriptions(state);
        Ok(self.subscriptions.reconcile(sub)?)
    }

    /// Queue a message from the host (for example a platform input event)
    pub fn dispatch(&self, msg: P::Msg) {
        self.queue.dispatch(msg);
    }

    /// A dispatch handle for code outside the runtime
    pub fn dispatcher(&self) -> Dispatch<P::Msg> {
        self.dispatch.clone()
    }

    /// Re-entrancy policy in use
    pub fn dispatch_mode(&self) -> DispatchMode {
        self.queue.mode()
    }

    /// Messages waiting for the next tick
    pub fn pending_messages(&self) -> usize {
        self.queue.pending_len()
    }

    /// The simulation clock
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The simulation clock, for pausing or changing time scale
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// The running subscriptions
    pub fn subscriptions(&self) -> &SubscriptionManager<P::Msg> {
        &self.subscriptions
    }

    /// The program being driven
    pub fn program(&self) -> &P {
        &self.program
    }

    /// Stop every running subscription
    pub fn shutdown(&mut self) {
        self.subscriptions.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRenderer;
    use crate::Error;
    use cadence_core::{Cmd, Disposer, FixedStepConfig, Pipeline, Sub, SubKey};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Msg {
        Add(i32),
        /// Handled by dispatching `Add(n)` as a follow-up
        Echo(i32),
        Listen(bool),
    }

    #[derive(Debug, Default)]
    struct State {
        total: i32,
        seen: Vec<Msg>,
        steps: u64,
        listening: bool,
    }

    /// Counts messages; listens on "clock" (and "clock" again if `duplicate`)
    #[derive(Default)]
    struct Counter {
        duplicate: bool,
        disposed: Arc<Mutex<Vec<String>>>,
    }

    impl Program for Counter {
        type State = State;
        type Msg = Msg;
        type Input = i32;
        type SortKey = i32;
        type Draw = String;

        fn init(&self) -> (State, Cmd<Msg>) {
            (State::default(), Cmd::of_msg(Msg::Add(100)))
        }

        fn update(&self, mut state: State, msg: Msg) -> (State, Cmd<Msg>) {
            state.seen.push(msg);
            match msg {
                Msg::Add(n) => {
                    state.total += n;
                    (state, Cmd::none())
                }
                Msg::Echo(n) => (state, Cmd::of_msg(Msg::Add(n))),
                Msg::Listen(on) => {
                    state.listening = on;
                    (state, Cmd::none())
                }
            }
        }

        fn step(&self, state: State, ctx: &StepContext<'_, i32>) -> (State, Cmd<Msg>) {
            let input = *ctx.input;
            Pipeline::start(state)
                .pipe_mut(|s| {
                    s.steps += 1;
                    Cmd::none()
                })
                .pipe(move |s| {
                    let cmd = if input != 0 {
                        Cmd::of_msg(Msg::Add(input))
                    } else {
                        Cmd::none()
                    };
                    (s, cmd)
                })
                .done()
        }

        fn subscriptions(&self, state: &State) -> Sub<Msg> {
            if !state.listening {
                return Sub::empty();
            }
            let listener = |disposed: Arc<Mutex<Vec<String>>>| {
                Sub::active("clock", move |dispatch: Dispatch<Msg>| {
                    dispatch.send(Msg::Add(1000));
                    Disposer::new(move || disposed.lock().push("clock".to_string()))
                })
            };
            let sub = listener(Arc::clone(&self.disposed));
            if self.duplicate {
                Sub::batch2(sub, listener(Arc::clone(&self.disposed)))
            } else {
                sub
            }
        }

        fn view(&self, state: &State, _ctx: &ViewContext, buffer: &mut RenderBuffer<i32, String>) {
            buffer.add(2, format!("total={}", state.total));
            buffer.add(1, "background".to_string());
            buffer.add(2, format!("steps={}", state.steps));
        }
    }

    fn runtime(mode: DispatchMode) -> Runtime<Counter> {
        let config = RuntimeConfig::default()
            .with_timestep(FixedStepConfig::new(0.25, 4, 2.0).unwrap())
            .with_dispatch_mode(mode);
        Runtime::new(Counter::default(), config).unwrap()
    }

    #[test]
    fn test_init_runs_startup_command_on_first_tick() {
        let mut rt = runtime(DispatchMode::FrameBounded);
        let mut renderer = RecordingRenderer::new();
        let state = rt.init().unwrap();
        assert_eq!(state.total, 0);
        assert_eq!(rt.pending_messages(), 1);

        let (state, report) = rt.frame(state, 0.25, &0, &mut renderer).unwrap();
        assert_eq!(report.steps, 1);
        assert_eq!(report.messages, 1);
        assert_eq!(state.total, 100);
    }

    #[test]
    fn test_frame_bounded_defers_follow_ups_to_next_tick() {
        let mut rt = runtime(DispatchMode::FrameBounded);
        let mut renderer = RecordingRenderer::new();
        let state = rt.init().unwrap();
        rt.dispatch(Msg::Echo(5));

        let (state, report) = rt.frame(state, 0.25, &0, &mut renderer).unwrap();
        assert_eq!(report.messages, 2);
        assert_eq!(state.seen, vec![Msg::Add(100), Msg::Echo(5)]);
        assert_eq!(rt.pending_messages(), 1);

        let (state, _) = rt.frame(state, 0.25, &0, &mut renderer).unwrap();
        assert_eq!(state.seen.last(), Some(&Msg::Add(5)));
        assert_eq!(state.total, 105);
    }

    #[test]
    fn test_immediate_handles_follow_ups_in_same_tick() {
        let mut rt = runtime(DispatchMode::Immediate);
        let mut renderer = RecordingRenderer::new();
        let state = rt.init().unwrap();
        rt.dispatch(Msg::Echo(5));

        let (state, report) = rt.frame(state, 0.25, &0, &mut renderer).unwrap();
        assert_eq!(report.messages, 3);
        assert_eq!(state.seen, vec![Msg::Add(100), Msg::Echo(5), Msg::Add(5)]);
        assert_eq!(rt.pending_messages(), 0);
    }

    #[test]
    fn test_step_commands_respect_dispatch_mode() {
        let mut rt = runtime(DispatchMode::Immediate);
        let mut renderer = RecordingRenderer::new();
        let state = rt.init().unwrap();
        let (state, _) = rt.frame(state, 0.25, &7, &mut renderer).unwrap();
        assert_eq!(state.total, 107);

        let mut rt = runtime(DispatchMode::FrameBounded);
        let state = rt.init().unwrap();
        let (state, _) = rt.frame(state, 0.25, &7, &mut renderer).unwrap();
        assert_eq!(state.total, 100);
        assert_eq!(rt.pending_messages(), 1);
    }

    #[test]
    fn test_overrun_is_reported_not_failed() {
        let mut rt = runtime(DispatchMode::FrameBounded);
        let mut renderer = RecordingRenderer::new();
        let state = rt.init().unwrap();

        let (state, report) = rt.frame(state, 1.5, &0, &mut renderer).unwrap();
        assert_eq!(report.steps, 4);
        assert!(report.dropped_time);
        assert_eq!(report.alpha, 0.0);
        assert_eq!(state.steps, 4);
        assert_eq!(rt.clock().tick(), 4);
    }

    #[test]
    fn test_no_ticks_means_no_messages_handled() {
        let mut rt = runtime(DispatchMode::FrameBounded);
        let mut renderer = RecordingRenderer::new();
        let state = rt.init().unwrap();

        let (state, report) = rt.frame(state, 0.125, &0, &mut renderer).unwrap();
        assert_eq!(report.steps, 0);
        assert_eq!(report.messages, 0);
        assert_eq!(report.alpha, 0.5);
        assert_eq!(state.total, 0);
        // The view still runs every frame
        assert_eq!(renderer.frame_count(), 1);
    }

    #[test]
    fn test_view_is_sorted_and_submitted() {
        let mut rt = runtime(DispatchMode::FrameBounded);
        let mut renderer = RecordingRenderer::new();
        let state = rt.init().unwrap();

        let (_, report) = rt.frame(state, 0.25, &0, &mut renderer).unwrap();
        assert_eq!(report.draw_commands, 3);
        let frame = renderer.last_frame().unwrap();
        let commands: Vec<&str> = frame.commands().map(String::as_str).collect();
        assert_eq!(commands, vec!["background", "total=100", "steps=1"]);
    }

    #[test]
    fn test_subscriptions_follow_state() {
        let mut rt = runtime(DispatchMode::FrameBounded);
        let mut renderer = RecordingRenderer::new();
        let state = rt.init().unwrap();
        rt.dispatch(Msg::Listen(true));

        let (state, report) = rt.frame(state, 0.25, &0, &mut renderer).unwrap();
        assert_eq!(report.subscriptions_started, 0);
        assert!(state.listening);

        // Started at the start of the next frame; its message lands in that tick
        let (state, report) = rt.frame(state, 0.25, &0, &mut renderer).unwrap();
        assert_eq!(report.subscriptions_started, 1);
        assert!(rt.subscriptions().is_running(&SubKey::new("clock")));
        assert_eq!(state.total, 1100);

        // Unchanged set: nothing restarted
        let (state, report) = rt.frame(state, 0.25, &0, &mut renderer).unwrap();
        assert_eq!(report.subscriptions_started, 0);
        assert_eq!(state.total, 1100);

        rt.dispatch(Msg::Listen(false));
        let (state, _) = rt.frame(state, 0.25, &0, &mut renderer).unwrap();
        let (_, report) = rt.frame(state, 0.25, &0, &mut renderer).unwrap();
        assert_eq!(report.subscriptions_stopped, 1);
        assert_eq!(*rt.program().disposed.lock(), vec!["clock".to_string()]);
        assert!(rt.subscriptions().is_empty());
    }

    #[test]
    fn test_duplicate_subscription_keys_fail_fast() {
        let program = Counter {
            duplicate: true,
            ..Counter::default()
        };
        let mut rt = Runtime::new(program, RuntimeConfig::default()).unwrap();
        let mut renderer = RecordingRenderer::new();
        let mut state = rt.init().unwrap();
        state.listening = true;

        let err = rt.frame(state, 0.1, &0, &mut renderer).unwrap_err();
        assert!(matches!(
            err,
            Error::Core(cadence_core::Error::DuplicateSubscriptionKey(_))
        ));
        assert_eq!(renderer.frame_count(), 0);
    }

    #[test]
    fn test_invalid_config_fails_at_startup() {
        let config = RuntimeConfig::default().with_time_scale(-2.0);
        assert!(Runtime::new(Counter::default(), config).is_err());
    }

    #[test]
    fn test_paused_clock_runs_no_ticks() {
        let mut rt = runtime(DispatchMode::FrameBounded);
        let mut renderer = RecordingRenderer::new();
        let state = rt.init().unwrap();
        rt.clock_mut().set_paused(true);

        let (state, report) = rt.frame(state, 1.0, &0, &mut renderer).unwrap();
        assert_eq!(report.steps, 0);
        assert_eq!(state.steps, 0);
        assert_eq!(rt.pending_messages(), 1);
    }

    #[test]
    fn test_shutdown_stops_listeners() {
        let mut rt = runtime(DispatchMode::FrameBounded);
        let mut renderer = RecordingRenderer::new();
        let mut state = rt.init().unwrap();
        state.listening = true;
        let _ = rt.frame(state, 0.0, &0, &mut renderer).unwrap();
        assert_eq!(rt.subscriptions().len(), 1);

        rt.shutdown();
        assert!(rt.subscriptions().is_empty());
        assert_eq!(rt.program().disposed.lock().len(), 1);
    }
}
