//! Subscriptions to long-lived external event sources
//!
//! A [`Sub`] tree is recomputed from application state once per host frame
//! and handed to a [`SubscriptionManager`], which compares the flattened keys
//! against the listeners already running:
//!
//! - keys that disappeared are disposed
//! - keys that appeared are started
//! - keys present in both are left running untouched
//!
//! The comparison itself is the pure [`diff`] function.

use crate::{Dispatch, Error, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable identity of a running listener
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubKey(String);

impl SubKey {
    /// Create a new key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// This key nested under a path segment: `prefix/key`
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self(format!("{}/{}", prefix, self.0))
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SubKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Releases a running listener
///
/// Disposing twice is a no-op. A handle that is dropped without being
/// disposed disposes itself.
pub struct Disposer {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Disposer {
    /// Create a disposer from a release closure
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A disposer with nothing to release
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Release the listener
    pub fn dispose(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Whether there is still something left to release
    pub fn is_live(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("live", &self.is_live())
            .finish()
    }
}

/// The start function of an active subscription
pub struct Listener<M> {
    start: Box<dyn FnOnce(Dispatch<M>) -> Disposer + Send>,
}

impl<M: 'static> Listener<M> {
    /// Create a listener from a start closure
    pub fn new(start: impl FnOnce(Dispatch<M>) -> Disposer + Send + 'static) -> Self {
        Self {
            start: Box::new(start),
        }
    }

    /// Start listening, returning the handle that stops it
    pub fn start(self, dispatch: Dispatch<M>) -> Disposer {
        (self.start)(dispatch)
    }

    fn map_shared<N: 'static>(self, f: Arc<dyn Fn(M) -> N + Send + Sync>) -> Listener<N> {
        Listener::new(move |dispatch: Dispatch<N>| self.start(dispatch.map(move |msg| f(msg))))
    }
}

impl<M> fmt::Debug for Listener<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Listener")
    }
}

/// A description of zero or more external listeners
#[derive(Debug)]
pub enum Sub<M> {
    /// No listener
    None,

    /// One keyed listener
    Active { key: SubKey, listener: Listener<M> },

    /// Batch multiple subscriptions
    Batch(Vec<Sub<M>>),
}

impl<M: 'static> Sub<M> {
    /// Create an empty subscription
    pub fn empty() -> Self {
        Sub::None
    }

    /// Create an active subscription
    pub fn active(
        key: impl Into<SubKey>,
        start: impl FnOnce(Dispatch<M>) -> Disposer + Send + 'static,
    ) -> Self {
        Sub::Active {
            key: key.into(),
            listener: Listener::new(start),
        }
    }

    /// Batch subscriptions, flattening nested batches and dropping empties
    pub fn batch(subs: impl IntoIterator<Item = Sub<M>>) -> Self {
        let mut flat = Vec::new();
        for sub in subs {
            sub.collect_active(&mut flat);
        }

        match flat.len() {
            0 => Sub::None,
            1 => flat.pop().unwrap_or(Sub::None),
            _ => Sub::Batch(flat),
        }
    }

    /// Batch two subscriptions
    pub fn batch2(a: Sub<M>, b: Sub<M>) -> Self {
        Self::batch([a, b])
    }

    fn collect_active(self, out: &mut Vec<Sub<M>>) {
        match self {
            Sub::None => {}
            active @ Sub::Active { .. } => out.push(active),
            Sub::Batch(subs) => {
                for sub in subs {
                    sub.collect_active(out);
                }
            }
        }
    }

    /// Nest every key under `prefix` and lift dispatched messages with `f`
    pub fn map<N: 'static>(self, prefix: &str, f: impl Fn(M) -> N + Send + Sync + 'static) -> Sub<N> {
        self.map_shared(prefix, Arc::new(f))
    }

    fn map_shared<N: 'static>(self, prefix: &str, f: Arc<dyn Fn(M) -> N + Send + Sync>) -> Sub<N> {
        match self {
            Sub::None => Sub::None,
            Sub::Active { key, listener } => Sub::Active {
                key: key.prefixed(prefix),
                listener: listener.map_shared(f),
            },
            Sub::Batch(subs) => Sub::Batch(
                subs.into_iter()
                    .map(|sub| sub.map_shared(prefix, Arc::clone(&f)))
                    .collect(),
            ),
        }
    }

    /// Every key in the tree, in order
    pub fn keys(&self) -> Vec<&SubKey> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, out: &mut Vec<&'a SubKey>) {
        match self {
            Sub::None => {}
            Sub::Active { key, .. } => out.push(key),
            Sub::Batch(subs) => {
                for sub in subs {
                    sub.collect_keys(out);
                }
            }
        }
    }

    /// Flatten into a key → listener mapping
    ///
    /// Fails on the first key that appears twice.
    pub fn flatten(self) -> Result<IndexMap<SubKey, Listener<M>>> {
        let mut flat = IndexMap::new();
        self.flatten_into(&mut flat)?;
        Ok(flat)
    }

    fn flatten_into(self, out: &mut IndexMap<SubKey, Listener<M>>) -> Result<()> {
        match self {
            Sub::None => Ok(()),
            Sub::Active { key, listener } => {
                if out.contains_key(&key) {
                    return Err(Error::DuplicateSubscriptionKey(key));
                }
                out.insert(key, listener);
                Ok(())
            }
            Sub::Batch(subs) => subs.into_iter().try_for_each(|sub| sub.flatten_into(out)),
        }
    }
}

impl<M> Default for Sub<M> {
    fn default() -> Self {
        Sub::None
    }
}

/// Keys to start and keys to stop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubDiff {
    /// New keys, in the order of the new set
    pub to_start: Vec<SubKey>,
    /// Removed keys, in the order of the previous set
    pub to_stop: Vec<SubKey>,
}

impl SubDiff {
    /// Check if nothing changed
    pub fn is_empty(&self) -> bool {
        self.to_start.is_empty() && self.to_stop.is_empty()
    }
}

/// Compare the previous key set with the next one
pub fn diff<'a>(
    previous: impl IntoIterator<Item = &'a SubKey>,
    next: impl IntoIterator<Item = &'a SubKey>,
) -> SubDiff {
    let previous: IndexSet<&SubKey> = previous.into_iter().collect();
    let next: IndexSet<&SubKey> = next.into_iter().collect();

    SubDiff {
        to_start: next
            .iter()
            .filter(|key| !previous.contains(**key))
            .map(|key| (*key).clone())
            .collect(),
        to_stop: previous
            .iter()
            .filter(|key| !next.contains(**key))
            .map(|key| (*key).clone())
            .collect(),
    }
}

/// Owns the handles of every running listener
pub struct SubscriptionManager<M> {
    dispatch: Dispatch<M>,
    running: IndexMap<SubKey, Disposer>,
}

impl<M: 'static> SubscriptionManager<M> {
    /// Create a manager whose listeners dispatch through `dispatch`
    pub fn new(dispatch: Dispatch<M>) -> Self {
        Self {
            dispatch,
            running: IndexMap::new(),
        }
    }

    /// Bring the running listeners in line with `sub`
    ///
    /// A duplicate key fails before anything is started or stopped.
    pub fn reconcile(&mut self, sub: Sub<M>) -> Result<SubDiff> {
        let next = sub.flatten()?;
        let changes = diff(self.running.keys(), next.keys());

        for key in &changes.to_stop {
            if let Some(mut disposer) = self.running.shift_remove(key) {
                tracing::debug!(key = %key, "stopping subscription");
                disposer.dispose();
            }
        }

        for (key, listener) in next {
            if self.running.contains_key(&key) {
                continue;
            }
            tracing::debug!(key = %key, "starting subscription");
            let disposer = listener.start(self.dispatch.clone());
            self.running.insert(key, disposer);
        }

        Ok(changes)
    }

    /// Dispose every running listener, oldest first
    pub fn shutdown(&mut self) {
        for (key, mut disposer) in self.running.drain(..) {
            tracing::debug!(key = %key, "stopping subscription");
            disposer.dispose();
        }
    }

    /// Keys of the running listeners, in start order
    pub fn running_keys(&self) -> impl Iterator<Item = &SubKey> {
        self.running.keys()
    }

    /// Check if a listener is running under `key`
    pub fn is_running(&self, key: &SubKey) -> bool {
        self.running.contains_key(key)
    }

    /// Number of running listeners
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Check if no listener is running
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}

impl<M> fmt::Debug for SubscriptionManager<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("running", &self.running.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    fn counted(key: &str, counters: &Arc<Counters>) -> Sub<i32> {
        let counters = Arc::clone(counters);
        Sub::active(key, move |_dispatch| {
            counters.starts.fetch_add(1, Ordering::SeqCst);
            Disposer::new(move || {
                counters.stops.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    fn keys(names: &[&str]) -> Vec<SubKey> {
        names.iter().map(|n| SubKey::new(*n)).collect()
    }

    fn manager() -> SubscriptionManager<i32> {
        SubscriptionManager::new(Dispatch::new(|_| {}))
    }

    #[test]
    fn test_map_prefixes_keys() {
        let a = Arc::new(Counters::default());
        let b = Arc::new(Counters::default());
        let sub = Sub::batch2(counted("A", &a), counted("B", &b)).map("prefix", |n| n);

        let keys: Vec<&str> = sub.keys().into_iter().map(SubKey::as_str).collect();
        assert_eq!(keys, vec!["prefix/A", "prefix/B"]);
    }

    #[test]
    fn test_removed_key_disposed_and_other_untouched() {
        let a = Arc::new(Counters::default());
        let b = Arc::new(Counters::default());
        let mut manager = manager();

        let frame1 = Sub::batch2(counted("A", &a), counted("B", &b)).map("prefix", |n| n);
        let changes = manager.reconcile(frame1).unwrap();
        assert_eq!(changes.to_start, keys(&["prefix/A", "prefix/B"]));
        assert!(changes.to_stop.is_empty());

        let frame2 = Sub::batch(vec![counted("A", &a)]).map("prefix", |n| n);
        let changes = manager.reconcile(frame2).unwrap();
        assert!(changes.to_start.is_empty());
        assert_eq!(changes.to_stop, keys(&["prefix/B"]));

        assert_eq!(b.starts.load(Ordering::SeqCst), 1);
        assert_eq!(b.stops.load(Ordering::SeqCst), 1);
        assert_eq!(a.starts.load(Ordering::SeqCst), 1);
        assert_eq!(a.stops.load(Ordering::SeqCst), 0);
        assert!(manager.is_running(&SubKey::new("prefix/A")));
        assert!(!manager.is_running(&SubKey::new("prefix/B")));
    }

    #[test]
    fn test_unchanged_set_is_not_restarted() {
        let a = Arc::new(Counters::default());
        let mut manager = manager();

        for _ in 0..3 {
            manager.reconcile(counted("tick", &a)).unwrap();
        }
        assert_eq!(a.starts.load(Ordering::SeqCst), 1);
        assert_eq!(a.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_key_fails_before_side_effects() {
        let a = Arc::new(Counters::default());
        let mut manager = manager();
        manager.reconcile(counted("keep", &a)).unwrap();

        let dup = Sub::batch(vec![counted("x", &a), Sub::batch(vec![counted("x", &a)])]);
        let err = manager.reconcile(dup).unwrap_err();
        assert_eq!(err, Error::DuplicateSubscriptionKey(SubKey::new("x")));

        assert_eq!(a.starts.load(Ordering::SeqCst), 1);
        assert_eq!(a.stops.load(Ordering::SeqCst), 0);
        assert!(manager.is_running(&SubKey::new("keep")));
    }

    #[test]
    fn test_map_lifts_listener_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let mut manager: SubscriptionManager<String> =
            SubscriptionManager::new(Dispatch::new(move |msg| sink.lock().push(msg)));

        let child: Sub<i32> = Sub::active("clock", |dispatch| {
            dispatch.send(1);
            dispatch.send(2);
            Disposer::noop()
        });
        manager
            .reconcile(child.map("hud", |n| format!("hud:{}", n)))
            .unwrap();

        assert_eq!(*log.lock(), vec!["hud:1".to_string(), "hud:2".to_string()]);
        assert!(manager.is_running(&SubKey::new("hud/clock")));
    }

    #[test]
    fn test_shutdown_disposes_everything() {
        let a = Arc::new(Counters::default());
        let mut manager = manager();
        manager
            .reconcile(Sub::batch(vec![counted("a", &a), counted("b", &a)]))
            .unwrap();
        assert_eq!(manager.len(), 2);

        manager.shutdown();
        assert!(manager.is_empty());
        assert_eq!(a.stops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disposer_is_idempotent() {
        let stops = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&stops);
        let mut disposer = Disposer::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        disposer.dispose();
        disposer.dispose();
        assert!(!disposer.is_live());
        drop(disposer);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_diff_is_order_preserving() {
        let previous = keys(&["a", "b", "c"]);
        let next = keys(&["d", "c", "a", "e"]);
        let changes = diff(&previous, &next);
        assert_eq!(changes.to_start, keys(&["d", "e"]));
        assert_eq!(changes.to_stop, keys(&["b"]));

        assert!(diff(&previous, &previous).is_empty());
    }

    #[test]
    fn test_batch_flattens_and_drops_empties() {
        let a = Arc::new(Counters::default());
        let sub = Sub::batch(vec![
            Sub::empty(),
            Sub::batch(vec![counted("a", &a), Sub::batch(vec![counted("b", &a)])]),
            Sub::None,
        ]);
        if let Sub::Batch(subs) = &sub {
            assert_eq!(subs.len(), 2);
        } else {
            panic!("Expected Batch");
        }

        let single = Sub::batch2(Sub::empty(), counted("only", &a));
        assert!(matches!(single, Sub::Active { .. }));
        assert!(matches!(Sub::<i32>::batch(vec![]), Sub::None));
    }
}
