//! Dependency Tracking
//!
//! An effect discovers what it depends on by running its read function with
//! a [`Tracker`]. Every atom read through the tracker is recorded; when the
//! read returns, the effect subscribes to exactly that set.
//!
//! # Implementation
//!
//! The tracker is an explicit value owned by one evaluation instead of a
//! thread-local "current computation" stack. Nested evaluations (an effect
//! created inside another effect's read) get their own tracker, so they
//! cannot leak dependencies into each other.
//!
//! Atoms are recorded as type-erased [`Source`]s keyed by [`AtomId`]. Reading
//! the same atom twice records it once, and the first read fixes its
//! position in the dependency order.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;

use super::subscriber::{AtomId, SubscriberId};

/// Callback attached to a source on behalf of a subscriber.
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// A type-erased atom that subscribers can attach to.
///
/// This is what a tracker records. The value type is erased so one effect
/// can depend on atoms of different types.
pub trait Source: Send + Sync {
    /// The atom's identity.
    fn atom_id(&self) -> AtomId;

    /// Attach `notify` to run after every applied update.
    fn attach(&self, subscriber: SubscriberId, notify: Notify);

    /// Detach a subscriber. Returns whether it was attached.
    fn detach(&self, subscriber: SubscriberId) -> bool;
}

/// Anything whose value can be read, with or without tracking.
pub trait Readable {
    /// The value produced by a read.
    type Value;

    /// Read without recording a dependency.
    fn get(&self) -> Self::Value;

    /// Read and record this value as a dependency of `tracker`.
    fn track(&self, tracker: &Tracker) -> Self::Value;
}

/// Dependency-tracking context for one evaluation of a read function.
#[derive(Default)]
pub struct Tracker {
    sources: RefCell<IndexMap<AtomId, Arc<dyn Source>>>,
}

impl Tracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `source` and record it as a dependency.
    pub fn get<R>(&self, source: &R) -> R::Value
    where
        R: Readable,
    {
        source.track(self)
    }

    /// Record a dependency directly. Duplicate IDs are ignored.
    pub fn record(&self, source: Arc<dyn Source>) {
        self.sources
            .borrow_mut()
            .entry(source.atom_id())
            .or_insert(source);
    }

    /// Whether the atom has been read through this tracker.
    pub fn is_tracking(&self, atom: AtomId) -> bool {
        self.sources.borrow().contains_key(&atom)
    }

    /// Number of distinct atoms read so far.
    pub fn dependency_count(&self) -> usize {
        self.sources.borrow().len()
    }

    /// IDs of the recorded atoms, in first-read order.
    pub fn dependencies(&self) -> Vec<AtomId> {
        self.sources.borrow().keys().copied().collect()
    }

    pub(crate) fn into_sources(self) -> IndexMap<AtomId, Arc<dyn Source>> {
        self.sources.into_inner()
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("dependencies", &self.dependencies())
            .finish()
    }
}
