//! Subscriber bookkeeping for atoms.
//!
//! Every listener attached to an atom is keyed by a [`SubscriberId`]. The
//! registry keeps listeners in insertion order, which is the order in which
//! they are notified.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Unique identifier for a subscriber.
///
/// Effects and plain listeners each get one. The same ID is used to
/// unsubscribe from every atom the subscriber was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(u64);

impl AtomId {
    /// Generate a new unique atom ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for AtomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom#{}", self.0)
    }
}

/// A callback invoked with an atom's value after it changes.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Listeners copied out of the registry for one notification pass.
///
/// Most atoms have a handful of subscribers, so the snapshot stays inline.
pub(crate) type Snapshot<T> = SmallVec<[Listener<T>; 4]>;

/// Ordered listener registry owned by an atom.
pub(crate) struct Subscribers<T> {
    listeners: IndexMap<SubscriberId, Listener<T>>,
}

impl<T> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: IndexMap::new(),
        }
    }

    /// Attach a listener. Re-inserting an existing ID replaces its callback
    /// but keeps its original position.
    pub(crate) fn insert(&mut self, id: SubscriberId, listener: Listener<T>) {
        self.listeners.insert(id, listener);
    }

    /// Detach a listener, preserving the order of the rest.
    pub(crate) fn remove(&mut self, id: SubscriberId) -> bool {
        self.listeners.shift_remove(&id).is_some()
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.listeners.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Copy the current listeners so they can run without the lock held.
    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.listeners.values().cloned().collect()
    }
}
