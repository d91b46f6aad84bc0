//! The message mailbox
//!
//! Messages enter through [`DispatchQueue::dispatch`] (or a [`Dispatch`]
//! handle obtained from [`DispatchQueue::dispatcher`]) and are drained in
//! discrete batches:
//!
//! ```text
//! idle ──start_batch──► batching ──end_batch──► idle
//!                          │
//!                     try_dequeue (FIFO)
//! ```
//!
//! The [`DispatchMode`] is consulted only when a message is enqueued. In
//! `Immediate` mode a message dispatched while a batch is draining joins the
//! tail of that batch; in `FrameBounded` mode it always waits for the next
//! batch.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Re-entrancy policy for messages dispatched while a batch is draining
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispatchMode {
    /// Dispatches made during a batch are drained within that same batch
    Immediate,
    /// Dispatches made during a batch are deferred to the next batch
    #[default]
    FrameBounded,
}

/// A cloneable "dispatch one message" callback
///
/// This is the only channel effects and subscription listeners have back
/// into the runtime. It is `Send + Sync` so work finishing on another thread
/// can re-enter through it.
pub struct Dispatch<M> {
    send: Arc<dyn Fn(M) + Send + Sync>,
}

impl<M: 'static> Dispatch<M> {
    /// Wrap a callback
    pub fn new(send: impl Fn(M) + Send + Sync + 'static) -> Self {
        Self {
            send: Arc::new(send),
        }
    }

    /// Dispatch a single message
    pub fn send(&self, msg: M) {
        (self.send)(msg)
    }

    /// Lift this callback to accept a local message type
    ///
    /// Every message sent to the returned handle is transformed by `f` and
    /// forwarded here, exactly once.
    pub fn map<N: 'static>(&self, f: impl Fn(N) -> M + Send + Sync + 'static) -> Dispatch<N> {
        let inner = self.clone();
        Dispatch::new(move |msg| inner.send(f(msg)))
    }
}

impl<M> Clone for Dispatch<M> {
    fn clone(&self) -> Self {
        Self {
            send: Arc::clone(&self.send),
        }
    }
}

impl<M> fmt::Debug for Dispatch<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch").finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct QueueState<M> {
    /// Messages waiting for the next `start_batch`
    pending: VecDeque<M>,
    /// Messages visible to the current drain
    active: VecDeque<M>,
    batching: bool,
}

impl<M> QueueState<M> {
    fn enqueue(&mut self, mode: DispatchMode, msg: M) {
        match (mode, self.batching) {
            (DispatchMode::Immediate, true) => self.active.push_back(msg),
            _ => self.pending.push_back(msg),
        }
    }
}

/// Buffers messages and hands them out one batch at a time
pub struct DispatchQueue<M> {
    mode: DispatchMode,
    state: Arc<Mutex<QueueState<M>>>,
}

impl<M: Send + 'static> DispatchQueue<M> {
    /// Create an idle queue with the given re-entrancy policy
    pub fn new(mode: DispatchMode) -> Self {
        Self {
            mode,
            state: Arc::new(Mutex::new(QueueState {
                pending: VecDeque::new(),
                active: VecDeque::new(),
                batching: false,
            })),
        }
    }

    /// The re-entrancy policy this queue was created with
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Enqueue a message
    ///
    /// Valid in any state. Never runs anything on the caller's stack.
    pub fn dispatch(&self, msg: M) {
        self.state.lock().enqueue(self.mode, msg);
    }

    /// A [`Dispatch`] handle that enqueues into this queue
    pub fn dispatcher(&self) -> Dispatch<M> {
        let state = Arc::clone(&self.state);
        let mode = self.mode;
        Dispatch::new(move |msg| state.lock().enqueue(mode, msg))
    }

    /// Move buffered messages into a new active batch
    ///
    /// Returns the number of messages visible at the start of the batch.
    /// Calling this while already batching leaves the current batch as is.
    pub fn start_batch(&self) -> usize {
        let mut state = self.state.lock();
        if !state.batching {
            state.batching = true;
            let pending = std::mem::take(&mut state.pending);
            state.active.extend(pending);
        }
        state.active.len()
    }

    /// Pop the next message of the active batch
    ///
    /// Returns `None` when the batch is exhausted or no batch is active.
    pub fn try_dequeue(&self) -> Option<M> {
        let mut state = self.state.lock();
        if !state.batching {
            return None;
        }
        state.active.pop_front()
    }

    /// Close the active batch
    ///
    /// Messages that were not drained stay ahead of anything deferred during
    /// the batch, so the next batch sees them first.
    pub fn end_batch(&self) {
        let mut state = self.state.lock();
        if !state.batching {
            return;
        }
        state.batching = false;
        let mut carried = std::mem::take(&mut state.active);
        carried.append(&mut state.pending);
        state.pending = carried;
    }

    /// Run one full batch, handing each message to `handler`
    ///
    /// The queue lock is released while `handler` runs, so it may dispatch.
    /// Returns the number of messages handled.
    pub fn drain_batch(&self, mut handler: impl FnMut(M)) -> usize {
        self.start_batch();
        let mut handled = 0;
        while let Some(msg) = self.try_dequeue() {
            handler(msg);
            handled += 1;
        }
        self.end_batch();
        tracing::trace!(handled, "dispatch batch drained");
        handled
    }

    /// Whether a batch is currently active
    pub fn is_batching(&self) -> bool {
        self.state.lock().batching
    }

    /// Messages waiting for the next batch
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Messages still to be drained from the active batch
    pub fn active_len(&self) -> usize {
        self.state.lock().active.len()
    }
}

impl<M: Send + 'static> Default for DispatchQueue<M> {
    fn default() -> Self {
        Self::new(DispatchMode::default())
    }
}

impl<M> fmt::Debug for DispatchQueue<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
