//! Derived Values
//!
//! A Derived is a read-only atom whose value is computed from other atoms.
//! It recomputes eagerly whenever one of its dependencies applies an
//! update, then pushes the result through its own distinct gate.
//!
//! # Why the Gate Matters Here
//!
//! A derived value often changes far less often than its inputs. With the
//! default distinct gate, a derived `revenue > target` flag only notifies
//! its dependents when the flag actually flips, no matter how many times
//! revenue moves in between:
//!
//! ```rust,ignore
//! let revenue = Atom::new(0);
//! let source = revenue.clone();
//! let on_target = Derived::new(move |cx| cx.get(&source) >= 1_000);
//!
//! revenue.set(200);   // recomputes false: suppressed
//! revenue.set(1_200); // recomputes true: notifies
//! revenue.set(1_500); // recomputes true: suppressed
//! ```
//!
//! # Lifetime
//!
//! Clones share one computation. Effects and other derived values that
//! track a Derived keep it alive. Once every handle and dependent is gone,
//! or after [`Derived::dispose`], recomputation stops and the last value is
//! kept.

use std::fmt::{self, Debug};
use std::sync::Arc;

use super::atom::Atom;
use super::context::{Notify, Readable, Source, Tracker};
use super::effect::Effect;
use super::equality::Equality;
use super::options::AtomOptions;
use super::subscriber::{AtomId, SubscriberId};

struct DerivedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    atom: Atom<T>,
    effect: Effect,
}

impl<T> Source for DerivedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn atom_id(&self) -> AtomId {
        self.atom.id()
    }

    fn attach(&self, subscriber: SubscriberId, notify: Notify) {
        self.atom.as_source().attach(subscriber, notify);
    }

    fn detach(&self, subscriber: SubscriberId) -> bool {
        self.atom.as_source().detach(subscriber)
    }
}

/// A read-only reactive value computed from other atoms.
pub struct Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<DerivedInner<T>>,
}

impl<T> Derived<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a distinct derived value using structural equality.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn(&Tracker) -> T + Send + Sync + 'static,
    {
        Self::with_options(compute, AtomOptions::default())
    }

    /// Create a derived value with explicit options.
    pub fn with_options<F>(compute: F, options: AtomOptions) -> Self
    where
        F: Fn(&Tracker) -> T + Send + Sync + 'static,
    {
        Self::with_equality(compute, options, Equality::structural())
    }
}

impl<T> Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a derived value with a custom equality strategy.
    ///
    /// `compute` runs immediately to produce the initial value.
    pub fn with_equality<F>(compute: F, options: AtomOptions, equality: Equality<T>) -> Self
    where
        F: Fn(&Tracker) -> T + Send + Sync + 'static,
    {
        let (effect, atom) = Effect::from_initial(compute, move |initial| {
            let atom = Atom::with_equality(initial, options, equality);
            let sink = atom.clone();
            (
                move |value: T| {
                    sink.set(value);
                },
                atom,
            )
        });

        Self {
            inner: Arc::new(DerivedInner { atom, effect }),
        }
    }

    /// ID of the atom that stores the computed value.
    pub fn id(&self) -> AtomId {
        self.inner.atom.id()
    }

    /// Diagnostic label, if one was configured.
    pub fn label(&self) -> Option<&str> {
        self.inner.atom.label()
    }

    /// Get a clone of the last computed value.
    pub fn get(&self) -> T {
        self.inner.atom.get()
    }

    /// Get the last computed value and record this as a dependency.
    pub fn track(&self, tracker: &Tracker) -> T {
        tracker.record(self.inner.clone());
        self.get()
    }

    /// Borrow the last computed value without cloning it.
    ///
    /// The same locking rules as [`Atom::with`] apply.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.atom.with(f)
    }

    /// Register a listener called after every applied recomputation.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.atom.subscribe(listener)
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.atom.unsubscribe(id)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.atom.subscriber_count()
    }

    /// Number of times the computation has run, including creation.
    pub fn compute_count(&self) -> usize {
        self.inner.effect.run_count()
    }

    /// IDs of the atoms the computation currently reads.
    pub fn dependencies(&self) -> Vec<AtomId> {
        self.inner.effect.dependencies()
    }

    /// Stop recomputing. The current value is kept.
    pub fn dispose(&self) {
        self.inner.effect.dispose();
    }

    /// Whether recomputation has been stopped.
    pub fn is_disposed(&self) -> bool {
        self.inner.effect.is_disposed()
    }
}

impl<T> Readable for Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Value = T;

    fn get(&self) -> T {
        Derived::get(self)
    }

    fn track(&self, tracker: &Tracker) -> T {
        Derived::track(self, tracker)
    }
}

impl<T> Clone for Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Derived<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("atom", &self.inner.atom)
            .field("compute_count", &self.compute_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
