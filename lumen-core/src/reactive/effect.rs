//! Effect Implementation
//!
//! An Effect pairs a read function with a change callback. The read function
//! decides what the effect depends on; the callback receives what it
//! returns every time one of those dependencies changes.
//!
//! # How Effects Work
//!
//! 1. On creation the read function runs once with a fresh [`Tracker`].
//!    The callback is not invoked for this initial evaluation.
//!
//! 2. The effect subscribes to every atom the read touched.
//!
//! 3. When any of those atoms applies an update, the read function runs
//!    again with a new tracker and its result is passed to the callback.
//!
//! 4. After each re-run the subscription set is reconciled: atoms that were
//!    not read this time are unsubscribed, newly read atoms are subscribed.
//!    Branching reads therefore only react to the branch that was taken.
//!
//! # Lifetime
//!
//! The [`Effect`] handle owns the effect. Atoms only hold a weak reference,
//! so dropping the handle disposes the effect just like calling
//! [`Effect::dispose`]. Either way the effect detaches from all of its atoms
//! and will not be invoked again, even by a notification pass that is
//! already in progress.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

use super::context::{Notify, Source, Tracker};
use super::subscriber::{AtomId, SubscriberId};

type Sources = SmallVec<[Arc<dyn Source>; 4]>;

/// Type-erased view of an effect, so handles are not generic over the
/// read function's output type.
trait EffectNode: Send + Sync {
    fn subscriber_id(&self) -> SubscriberId;
    fn dispose(&self);
    fn is_disposed(&self) -> bool;
    fn run_count(&self) -> usize;
    fn dependencies(&self) -> Vec<AtomId>;
}

struct EffectInner<T> {
    id: SubscriberId,
    read: Box<dyn Fn(&Tracker) -> T + Send + Sync>,
    on_change: Box<dyn Fn(T) + Send + Sync>,
    dependencies: Mutex<IndexMap<AtomId, Arc<dyn Source>>>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
    this: Weak<EffectInner<T>>,
}

impl<T> EffectInner<T>
where
    T: 'static,
{
    /// Run the read function and resubscribe to whatever it touched.
    fn evaluate(&self) -> T {
        let tracker = Tracker::new();
        let value = (self.read)(&tracker);
        self.run_count.fetch_add(1, Ordering::SeqCst);
        self.reconcile(tracker.into_sources());
        value
    }

    /// Called by a dependency after it applied an update.
    fn rerun(&self) {
        if self.is_disposed() {
            return;
        }
        let value = self.evaluate();
        if self.is_disposed() {
            return;
        }
        (self.on_change)(value);
    }

    fn notifier(&self) -> Notify {
        let this = self.this.clone();
        Arc::new(move || {
            if let Some(effect) = this.upgrade() {
                effect.rerun();
            }
        })
    }

    /// Swap in the atoms read by the latest run.
    ///
    /// The dependency lock is held across attach and detach so that two
    /// re-runs on different threads cannot leave the map and the atoms'
    /// subscriber lists disagreeing. Lock order is effect, then atom.
    fn reconcile(&self, next: IndexMap<AtomId, Arc<dyn Source>>) {
        let mut current = self.dependencies.lock();
        if self.is_disposed() {
            return;
        }

        let stale: Sources = current
            .iter()
            .filter(|(id, _)| !next.contains_key(*id))
            .map(|(_, source)| Arc::clone(source))
            .collect();
        let added: Sources = next
            .iter()
            .filter(|(id, _)| !current.contains_key(*id))
            .map(|(_, source)| Arc::clone(source))
            .collect();
        *current = next;

        if stale.is_empty() && added.is_empty() {
            return;
        }

        for source in &stale {
            source.detach(self.id);
        }
        if !added.is_empty() {
            let notify = self.notifier();
            for source in &added {
                source.attach(self.id, Arc::clone(&notify));
            }
        }
        drop(current);

        debug!(
            effect = ?self.id,
            added = added.len(),
            removed = stale.len(),
            "effect dependencies changed"
        );
    }

    fn detach_all(&self) {
        let mut dependencies = self.dependencies.lock();
        for source in dependencies.values() {
            source.detach(self.id);
        }
        dependencies.clear();
    }
}

impl<T> EffectNode for EffectInner<T>
where
    T: 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.detach_all();
        debug!(effect = ?self.id, runs = self.run_count(), "effect disposed");
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn run_count(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }

    fn dependencies(&self) -> Vec<AtomId> {
        self.dependencies.lock().keys().copied().collect()
    }
}

/// Handle to a running effect.
///
/// # Example
///
/// ```rust,ignore
/// let count = Atom::new(0);
///
/// let source = count.clone();
/// let effect = Effect::new(
///     move |cx| cx.get(&source),
///     |value| println!("count is now {value}"),
/// );
///
/// count.set(5); // prints "count is now 5"
/// effect.dispose();
/// count.set(6); // prints nothing
/// ```
#[must_use = "dropping an Effect disposes it"]
pub struct Effect {
    node: Arc<dyn EffectNode>,
}

impl Effect {
    /// Create an effect from a read function and a change callback.
    ///
    /// `read` runs immediately to discover dependencies; `on_change` is
    /// only called for later changes.
    pub fn new<T, R, C>(read: R, on_change: C) -> Self
    where
        T: 'static,
        R: Fn(&Tracker) -> T + Send + Sync + 'static,
        C: Fn(T) + Send + Sync + 'static,
    {
        Self::from_initial(read, move |_| (on_change, ())).0
    }

    /// Create an effect whose only work is its read function.
    ///
    /// `f` runs on creation and again after every dependency change.
    pub fn watch<F>(f: F) -> Self
    where
        F: Fn(&Tracker) + Send + Sync + 'static,
    {
        Self::new(f, |()| {})
    }

    /// Create an effect whose callback is built from its initial value.
    ///
    /// `finish` receives the result of the first read and returns the change
    /// callback plus anything the caller wants back. It runs before the
    /// effect subscribes to a single atom, so no change can reach a callback
    /// that does not exist yet.
    pub(crate) fn from_initial<T, X, R, F, C>(read: R, finish: F) -> (Self, X)
    where
        T: 'static,
        R: Fn(&Tracker) -> T + Send + Sync + 'static,
        F: FnOnce(T) -> (C, X),
        C: Fn(T) + Send + Sync + 'static,
    {
        let tracker = Tracker::new();
        let initial = read(&tracker);
        let (on_change, output) = finish(initial);

        let inner = Arc::new_cyclic(|this| EffectInner {
            id: SubscriberId::new(),
            read: Box::new(read),
            on_change: Box::new(on_change),
            dependencies: Mutex::new(IndexMap::new()),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(1),
            this: this.clone(),
        });
        inner.reconcile(tracker.into_sources());

        debug!(
            effect = ?inner.id,
            dependencies = inner.dependencies.lock().len(),
            "effect created"
        );

        (Self { node: inner }, output)
    }

    /// The subscriber ID this effect uses on its atoms.
    pub fn id(&self) -> SubscriberId {
        self.node.subscriber_id()
    }

    /// Detach from every atom. Idempotent.
    pub fn dispose(&self) {
        self.node.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.node.is_disposed()
    }

    /// Number of times the read function has run, including creation.
    pub fn run_count(&self) -> usize {
        self.node.run_count()
    }

    /// Number of atoms the effect is subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.node.dependencies().len()
    }

    /// IDs of the atoms the effect is subscribed to, in first-read order.
    pub fn dependencies(&self) -> Vec<AtomId> {
        self.node.dependencies()
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        self.node.dispose();
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect. Shorthand for [`Effect::new`].
pub fn create_effect<T, R, C>(read: R, on_change: C) -> Effect
where
    T: 'static,
    R: Fn(&Tracker) -> T + Send + Sync + 'static,
    C: Fn(T) + Send + Sync + 'static,
{
    Effect::new(read, on_change)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Atom, AtomOptions};
    use std::sync::atomic::AtomicI32;

    fn counter() -> (Arc<AtomicI32>, impl Fn(i32) + Send + Sync + 'static) {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        (count, move |_: i32| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn effect_reads_on_creation_without_calling_back() {
        let atom = Atom::new(3);
        let (changes, on_change) = counter();

        let source = atom.clone();
        let effect = Effect::new(move |cx| cx.get(&source), on_change);

        assert_eq!(effect.run_count(), 1);
        assert_eq!(effect.dependencies(), vec![atom.id()]);
        assert_eq!(changes.load(Ordering::SeqCst), 0);
        assert!(atom.has_subscriber(effect.id()));
    }

    #[test]
    fn effect_receives_new_value() {
        let atom = Atom::new(0);
        let observed = Arc::new(AtomicI32::new(-1));
        let observed_clone = observed.clone();

        let source = atom.clone();
        let _effect = Effect::new(
            move |cx| cx.get(&source) * 10,
            move |value| observed_clone.store(value, Ordering::SeqCst),
        );

        atom.set(4);
        assert_eq!(observed.load(Ordering::SeqCst), 40);
    }

    #[test]
    fn effect_respects_distinct_gate() {
        let distinct = Atom::new(0);
        let eager = Atom::with_options(0, AtomOptions::new().distinct(false));
        let (distinct_changes, on_distinct) = counter();
        let (eager_changes, on_eager) = counter();

        let source = distinct.clone();
        let _a = Effect::new(move |cx| cx.get(&source), on_distinct);
        let source = eager.clone();
        let _b = Effect::new(move |cx| cx.get(&source), on_eager);

        distinct.set(0);
        eager.set(0);

        assert_eq!(distinct_changes.load(Ordering::SeqCst), 0);
        assert_eq!(eager_changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let atom = Atom::new(0);
        let (changes, on_change) = counter();

        let source = atom.clone();
        let effect = Effect::new(move |cx| cx.get(&source), on_change);

        atom.set(1);
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        effect.dispose();
        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(atom.subscriber_count(), 0);
        assert_eq!(effect.dependency_count(), 0);

        atom.set(2);
        atom.set(3);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_handle_disposes() {
        let atom = Atom::new(0);
        let (changes, on_change) = counter();

        {
            let source = atom.clone();
            let _effect = Effect::new(move |cx| cx.get(&source), on_change);
            assert_eq!(atom.subscriber_count(), 1);
        }

        assert_eq!(atom.subscriber_count(), 0);
        atom.set(1);
        assert_eq!(changes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn effect_tracks_multiple_atoms() {
        let a = Atom::new(1);
        let b = Atom::new(2);
        let sum = Arc::new(AtomicI32::new(0));
        let sum_clone = sum.clone();

        let (ra, rb) = (a.clone(), b.clone());
        let effect = Effect::new(
            move |cx| cx.get(&ra) + cx.get(&rb),
            move |value| sum_clone.store(value, Ordering::SeqCst),
        );
        assert_eq!(effect.dependency_count(), 2);

        a.set(10);
        assert_eq!(sum.load(Ordering::SeqCst), 12);
        b.set(20);
        assert_eq!(sum.load(Ordering::SeqCst), 30);
    }

    #[test]
    fn effect_follows_dynamic_dependencies() {
        let use_left = Atom::new(true);
        let left = Atom::new(1);
        let right = Atom::new(100);
        let (changes, on_change) = counter();

        let (flag, l, r) = (use_left.clone(), left.clone(), right.clone());
        let effect = Effect::new(
            move |cx| if cx.get(&flag) { cx.get(&l) } else { cx.get(&r) },
            on_change,
        );
        assert_eq!(effect.dependencies(), vec![use_left.id(), left.id()]);

        // Not read yet: no reaction.
        right.set(101);
        assert_eq!(changes.load(Ordering::SeqCst), 0);

        use_left.set(false);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert_eq!(effect.dependencies(), vec![use_left.id(), right.id()]);
        assert_eq!(left.subscriber_count(), 0);

        // The branch not taken is no longer a dependency.
        left.set(2);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        right.set(102);
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispose_during_pass_skips_pending_effect() {
        let atom = Atom::new(0);
        let (changes, on_change) = counter();

        // Subscribed first, so it runs before the effect in each pass.
        let victim: Arc<Mutex<Option<Effect>>> = Arc::new(Mutex::new(None));
        let victim_clone = victim.clone();
        atom.subscribe(move |_| {
            if let Some(effect) = victim_clone.lock().as_ref() {
                effect.dispose();
            }
        });

        let source = atom.clone();
        *victim.lock() = Some(Effect::new(move |cx| cx.get(&source), on_change));

        atom.set(1);
        assert_eq!(changes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn watch_runs_on_creation_and_change() {
        let atom = Atom::new(0);
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let source = atom.clone();
        let effect = Effect::watch(move |cx| {
            cx.get(&source);
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        atom.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn callback_is_built_before_any_subscription() {
        let atom = Atom::new(2);
        let watched = atom.clone();
        let source = atom.clone();

        let (effect, doubled) = Effect::from_initial(
            move |cx| cx.get(&source),
            move |initial| {
                assert_eq!(watched.subscriber_count(), 0);
                (|_: i32| {}, initial * 2)
            },
        );

        assert_eq!(doubled, 4);
        assert_eq!(effect.run_count(), 1);
        assert!(atom.has_subscriber(effect.id()));
    }

    #[test]
    fn concurrent_reruns_keep_subscriptions_consistent() {
        let left = Atom::with_options(0, AtomOptions::new().distinct(false));
        let right = Atom::with_options(0, AtomOptions::new().distinct(false));
        let branch = Atom::new(0);
        let toggle = Arc::new(AtomicBool::new(false));

        let (l, r, b, flip) = (left.clone(), right.clone(), branch.clone(), toggle.clone());
        let effect = Effect::watch(move |cx| {
            cx.get(&l);
            cx.get(&r);
            // Alternate between reading and skipping `branch`.
            if flip.fetch_xor(true, Ordering::SeqCst) {
                cx.get(&b);
            }
        });

        let handles: Vec<_> = [left.clone(), right.clone()]
            .into_iter()
            .map(|trigger| {
                std::thread::spawn(move || {
                    for i in 0..500 {
                        trigger.set(i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for atom_id in [left.id(), right.id()] {
            assert!(effect.dependencies().contains(&atom_id));
        }
        assert!(left.has_subscriber(effect.id()));
        assert!(right.has_subscriber(effect.id()));
        assert_eq!(
            effect.dependencies().contains(&branch.id()),
            branch.has_subscriber(effect.id())
        );
    }

    #[test]
    fn create_effect_matches_effect_new() {
        let atom = Atom::new(0);
        let (changes, on_change) = counter();

        let source = atom.clone();
        let effect = create_effect(move |cx| cx.get(&source), on_change);
        atom.set(1);

        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert!(format!("{:?}", effect).contains("run_count: 2"));
    }
}
