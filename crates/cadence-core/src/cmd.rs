//! Commands (side effects) produced by the update function
//!
//! A [`Cmd`] is a description of work, not work that has happened. The
//! runtime executes it after an update by running every contained
//! [`Effect`], in order, with the same [`Dispatch`] callback.

use crate::Dispatch;
use std::fmt;
use std::sync::Arc;

/// One unit of deferred work
///
/// When run, an effect may call its dispatch callback zero or more times,
/// right away or later from elsewhere (after cloning the handle).
pub struct Effect<M> {
    run: Box<dyn FnOnce(&Dispatch<M>) + Send>,
}

impl<M: 'static> Effect<M> {
    /// Create an effect from a closure
    pub fn new(run: impl FnOnce(&Dispatch<M>) + Send + 'static) -> Self {
        Self { run: Box::new(run) }
    }

    /// Run the effect, consuming it
    pub fn run(self, dispatch: &Dispatch<M>) {
        (self.run)(dispatch)
    }

    fn map_shared<N: 'static>(self, f: Arc<dyn Fn(M) -> N + Send + Sync>) -> Effect<N> {
        Effect::new(move |dispatch: &Dispatch<N>| {
            let local = dispatch.map(move |msg| f(msg));
            self.run(&local)
        })
    }
}

impl<M> fmt::Debug for Effect<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Effect")
    }
}

/// A command to be executed by the runtime
#[derive(Debug)]
pub enum Cmd<M> {
    /// No operation
    None,

    /// A single effect
    Single(Effect<M>),

    /// Batch multiple commands
    Batch(Vec<Cmd<M>>),
}

impl<M: 'static> Cmd<M> {
    /// Create an empty command
    pub fn none() -> Self {
        Cmd::None
    }

    /// Create a single-effect command
    pub fn of_effect(effect: Effect<M>) -> Self {
        Cmd::Single(effect)
    }

    /// Create a command from an effect closure
    pub fn effect(run: impl FnOnce(&Dispatch<M>) + Send + 'static) -> Self {
        Cmd::Single(Effect::new(run))
    }

    /// Create a batch of commands
    ///
    /// Nested batches are flattened, left to right, and empty commands are
    /// dropped. A batch of one effect collapses to [`Cmd::Single`].
    pub fn batch(cmds: impl IntoIterator<Item = Cmd<M>>) -> Self {
        let mut effects = Vec::new();
        for cmd in cmds {
            cmd.collect_effects(&mut effects);
        }

        match effects.len() {
            0 => Cmd::None,
            1 => effects.pop().map_or(Cmd::None, Cmd::Single),
            _ => Cmd::Batch(effects.into_iter().map(Cmd::Single).collect()),
        }
    }

    /// Lift the command's message type
    ///
    /// Effects are neither re-ordered nor duplicated; every message they
    /// dispatch passes through `f` on its way out.
    pub fn map<N: 'static>(self, f: impl Fn(M) -> N + Send + Sync + 'static) -> Cmd<N> {
        self.map_shared(Arc::new(f))
    }

    fn map_shared<N: 'static>(self, f: Arc<dyn Fn(M) -> N + Send + Sync>) -> Cmd<N> {
        match self {
            Cmd::None => Cmd::None,
            Cmd::Single(effect) => Cmd::Single(effect.map_shared(f)),
            Cmd::Batch(cmds) => Cmd::Batch(
                cmds.into_iter()
                    .map(|cmd| cmd.map_shared(Arc::clone(&f)))
                    .collect(),
            ),
        }
    }

    fn collect_effects(self, out: &mut Vec<Effect<M>>) {
        match self {
            Cmd::None => {}
            Cmd::Single(effect) => out.push(effect),
            Cmd::Batch(cmds) => {
                for cmd in cmds {
                    cmd.collect_effects(out);
                }
            }
        }
    }

    /// Flatten into the ordered sequence of effects
    pub fn into_effects(self) -> Vec<Effect<M>> {
        let mut effects = Vec::new();
        self.collect_effects(&mut effects);
        effects
    }

    /// Run every effect, in order, with the same dispatch callback
    ///
    /// Returns the number of effects run.
    pub fn execute(self, dispatch: &Dispatch<M>) -> usize {
        let effects = self.into_effects();
        let count = effects.len();
        for effect in effects {
            effect.run(dispatch);
        }
        count
    }

    /// Number of effects after flattening
    pub fn len(&self) -> usize {
        match self {
            Cmd::None => 0,
            Cmd::Single(_) => 1,
            Cmd::Batch(cmds) => cmds.iter().map(Cmd::len).sum(),
        }
    }

    /// Check if this command has no effects
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if this is a None command
    pub fn is_none(&self) -> bool {
        matches!(self, Cmd::None)
    }
}

impl<M: Send + 'static> Cmd<M> {
    /// A command that dispatches `msg` as soon as it is executed
    pub fn of_msg(msg: M) -> Self {
        Cmd::effect(move |dispatch| dispatch.send(msg))
    }

    /// A command that computes one message when executed
    pub fn perform(f: impl FnOnce() -> M + Send + 'static) -> Self {
        Cmd::effect(move |dispatch| dispatch.send(f()))
    }
}

impl<M> Default for Cmd<M> {
    fn default() -> Self {
        Cmd::None
    }
}

impl<M: 'static> From<Effect<M>> for Cmd<M> {
    fn from(effect: Effect<M>) -> Self {
        Cmd::Single(effect)
    }
}

impl<M: 'static> From<Vec<Cmd<M>>> for Cmd<M> {
    fn from(cmds: Vec<Cmd<M>>) -> Self {
        Cmd::batch(cmds)
    }
}

impl<M: 'static> FromIterator<Cmd<M>> for Cmd<M> {
    fn from_iter<I: IntoIterator<Item = Cmd<M>>>(iter: I) -> Self {
        Cmd::batch(iter)
    }
}
