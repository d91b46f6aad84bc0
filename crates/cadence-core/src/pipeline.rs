//! Update pipeline: thread state through an ordered list of systems
//!
//! ```text
//! start(state)
//!   .pipe(movement)        state → (state, cmd)
//!   .pipe(collision)       state → (state, cmd)
//!   .pipe_mut(respawn)     &mut state → cmd
//!   .finish(|s| s)         → (state, batch(all cmds))
//! ```
//!
//! Every system runs exactly once, in registration order, and the collected
//! commands keep that order no matter which variant produced them.

use crate::Cmd;
use std::fmt;

/// A pipeline in progress
pub struct Pipeline<S, M> {
    state: S,
    cmds: Vec<Cmd<M>>,
}

impl<S, M: 'static> Pipeline<S, M> {
    /// Begin a pipeline carrying `state` and no commands
    pub fn start(state: S) -> Self {
        Self {
            state,
            cmds: Vec::new(),
        }
    }

    /// Run a system that takes the state by value
    ///
    /// The system may return a single [`Cmd`], an [`Effect`](crate::Effect),
    /// or a `Vec<Cmd>`.
    pub fn pipe<C: Into<Cmd<M>>>(self, system: impl FnOnce(S) -> (S, C)) -> Self {
        let Self { state, mut cmds } = self;
        let (state, cmd) = system(state);
        let cmd = cmd.into();
        if !cmd.is_none() {
            cmds.push(cmd);
        }
        Self { state, cmds }
    }

    /// Run a system that mutates the state in place
    pub fn pipe_mut<C: Into<Cmd<M>>>(self, system: impl FnOnce(&mut S) -> C) -> Self {
        self.pipe(|mut state| {
            let cmd = system(&mut state);
            (state, cmd)
        })
    }

    /// Convert the carried state into another representation
    ///
    /// Typically turns a scratch buffer used by [`pipe_mut`](Self::pipe_mut)
    /// stages back into the immutable form later `pipe` stages expect.
    /// Commands collected so far are kept.
    pub fn snapshot<T>(self, f: impl FnOnce(S) -> T) -> Pipeline<T, M> {
        Pipeline {
            state: f(self.state),
            cmds: self.cmds,
        }
    }

    /// The state as it stands after the stages so far
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Number of effects collected so far
    pub fn effect_count(&self) -> usize {
        self.cmds.iter().map(Cmd::len).sum()
    }

    /// End the pipeline, returning `(f(state), batch(commands))`
    pub fn finish<T>(self, f: impl FnOnce(S) -> T) -> (T, Cmd<M>) {
        (f(self.state), Cmd::batch(self.cmds))
    }

    /// End the pipeline with the state unchanged
    pub fn done(self) -> (S, Cmd<M>) {
        self.finish(|state| state)
    }
}

impl<S: fmt::Debug, M> fmt::Debug for Pipeline<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("commands", &self.cmds.len())
            .finish()
    }
}
