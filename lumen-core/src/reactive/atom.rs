//! Atom Implementation
//!
//! An Atom is the fundamental reactive primitive. It holds one value and a
//! list of subscribers that hear about every applied update.
//!
//! # Distinct Gating
//!
//! Atoms are distinct by default. A distinct atom compares the incoming
//! value with the stored one using its [`Equality`] strategy and drops the
//! update when they are equal: the value is not replaced and nobody is
//! notified. A non-distinct atom applies and broadcasts every update, equal
//! or not, which suits event-like values such as ticks or "refresh" pulses.
//!
//! # How Updates Flow
//!
//! 1. `set` takes the value write lock, runs the gate, and swaps the value.
//!
//! 2. The lock is released and the atom's dispatcher runs a pass: the
//!    subscriber list is snapshotted and each listener is called in
//!    subscription order with the new value.
//!
//! 3. Listeners run with no atom lock held, so they may read or set any
//!    atom, including this one. See [`dispatch`](super::dispatch) for what
//!    happens when they do.
//!
//! # Thread Safety
//!
//! The value and subscriber list sit behind `parking_lot` locks, so atoms
//! are `Send + Sync` and no update is ever observed half-applied. Updates
//! from different threads are not ordered against each other.

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::error::Result;
use super::context::{Notify, Readable, Source, Tracker};
use super::dispatch::{Dispatch, Dispatcher};
use super::equality::Equality;
use super::options::AtomOptions;
use super::subscriber::{AtomId, Listener, SubscriberId, Subscribers};

/// Shared state behind every clone of an [`Atom`].
pub(crate) struct AtomInner<T> {
    id: AtomId,
    options: AtomOptions,
    equality: Equality<T>,
    value: RwLock<T>,
    subscribers: RwLock<Subscribers<T>>,
    dispatcher: Dispatcher,
}

/// A reactive cell holding a value of type `T`.
///
/// Cloning an atom yields another handle to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Atom::new(0);
///
/// count.set(0); // equal to the stored value: suppressed
/// count.set(1); // applied, subscribers notified
/// assert_eq!(count.get(), 1);
/// ```
pub struct Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<AtomInner<T>>,
}

impl<T> Atom<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a distinct atom using structural equality.
    pub fn new(value: T) -> Self {
        Self::with_options(value, AtomOptions::default())
    }

    /// Create an atom with explicit options and structural equality.
    pub fn with_options(value: T, options: AtomOptions) -> Self {
        Self::with_equality(value, options, Equality::structural())
    }
}

impl<T> Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an atom with a custom equality strategy.
    ///
    /// This is the constructor for types without `PartialEq`, or where
    /// `PartialEq` is not the comparison the gate should use.
    pub fn with_equality(value: T, options: AtomOptions, equality: Equality<T>) -> Self {
        Self {
            inner: Arc::new(AtomInner {
                id: AtomId::new(),
                options,
                equality,
                value: RwLock::new(value),
                subscribers: RwLock::new(Subscribers::new()),
                dispatcher: Dispatcher::new(),
            }),
        }
    }

    /// Get the atom's unique ID.
    pub fn id(&self) -> AtomId {
        self.inner.id
    }

    /// Diagnostic label, if one was configured.
    pub fn label(&self) -> Option<&str> {
        self.inner.options.label.as_deref()
    }

    /// Whether equal-valued updates are suppressed.
    pub fn is_distinct(&self) -> bool {
        self.inner.options.distinct
    }

    /// The options this atom was created with.
    pub fn options(&self) -> &AtomOptions {
        &self.inner.options
    }

    /// The equality strategy used by the gate.
    pub fn equality(&self) -> &Equality<T> {
        &self.inner.equality
    }

    /// Get a clone of the current value.
    ///
    /// This never records a dependency; use [`Atom::track`] or
    /// [`Tracker::get`] from inside an effect's read function.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Get the current value and record this atom as a dependency.
    pub fn track(&self, tracker: &Tracker) -> T {
        tracker.record(self.inner.clone());
        self.get()
    }

    /// Borrow the current value without cloning it.
    ///
    /// The read lock is held while `f` runs. `f` must not set this atom, and
    /// must not read it again either: a writer queued on another thread
    /// blocks the second read and the two threads deadlock.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.inner.value.read();
        f(&*value)
    }

    /// Set a new value.
    ///
    /// On a distinct atom an equal value is ignored. Otherwise the value is
    /// stored and every subscriber is called with it, in subscription order.
    /// Returns whether the value was applied.
    pub fn set(&self, value: T) -> bool {
        match self.try_set(value) {
            Ok(outcome) => outcome.is_applied(),
            Err(err) => {
                warn!(atom = %self.inner.id, label = ?self.label(), error = %err, "set did not settle");
                true
            }
        }
    }

    /// Set a new value and report how it was delivered.
    ///
    /// Returns [`Dispatch::Suppressed`] when the gate drops the value,
    /// [`Dispatch::Deferred`] when a pass on this atom is already running,
    /// and [`Dispatch::Delivered`] with the pass count otherwise. A runaway
    /// update cascade is an error. The value is applied before any error is
    /// returned; an error only means some listeners may not have seen the
    /// final value.
    pub fn try_set(&self, value: T) -> Result<Dispatch> {
        if !self.inner.replace(value) {
            return Ok(Dispatch::Suppressed);
        }
        self.inner.dispatch()
    }

    /// Set a value computed from the current one.
    ///
    /// `f` runs on a clone of the value with no lock held, so it may read
    /// this atom. The read and the write are not atomic together.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.get();
        self.set(f(&current))
    }

    /// Register a listener called with the value after every applied update.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.inner.subscribers.write().insert(id, Arc::new(listener));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.write().remove(id)
    }

    /// Get the number of subscribers, effects included.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Whether the given subscriber is attached to this atom.
    pub fn has_subscriber(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.read().contains(id)
    }

    /// Whether this atom is currently notifying its subscribers.
    pub fn is_notifying(&self) -> bool {
        self.inner.dispatcher.is_active()
    }

    pub(crate) fn as_source(&self) -> Arc<dyn Source> {
        self.inner.clone()
    }
}

impl<T> AtomInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run the gate and store the value. Returns whether it was applied.
    fn replace(&self, next: T) -> bool {
        let mut value = self.value.write();
        if self.options.distinct && self.equality.eq(&value, &next) {
            trace!(atom = %self.id, label = ?self.options.label, "update suppressed");
            return false;
        }
        *value = next;
        trace!(atom = %self.id, label = ?self.options.label, "update applied");
        true
    }

    fn dispatch(&self) -> Result<Dispatch> {
        self.dispatcher.run(self.id, self.options.max_cascade.get(), || {
            let listeners = self.subscribers.read().snapshot();
            if listeners.is_empty() {
                return;
            }
            let value = self.value.read().clone();
            for listener in &listeners {
                listener(&value);
            }
        })
    }
}

impl<T> Source for AtomInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn atom_id(&self) -> AtomId {
        self.id
    }

    fn attach(&self, subscriber: SubscriberId, notify: Notify) {
        let listener: Listener<T> = Arc::new(move |_: &T| notify());
        self.subscribers.write().insert(subscriber, listener);
    }

    fn detach(&self, subscriber: SubscriberId) -> bool {
        self.subscribers.write().remove(subscriber)
    }
}

impl<T> Readable for Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Value = T;

    fn get(&self) -> T {
        Atom::get(self)
    }

    fn track(&self, tracker: &Tracker) -> T {
        Atom::track(self, tracker)
    }
}

impl<T> Clone for Atom<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Atom<T>
where
    T: Clone + Send + Sync + PartialEq + Default + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Debug for Atom<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.inner.id)
            .field("label", &self.inner.options.label)
            .field("value", &*self.inner.value.read())
            .field("distinct", &self.inner.options.distinct)
            .field("equality", &self.inner.equality)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
