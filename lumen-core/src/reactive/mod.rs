//! Reactive Primitives
//!
//! This module implements the reactive core: atoms, effects, and derived
//! values.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An Atom is a container for mutable state. Setting it runs a distinct
//! gate first: on a distinct atom (the default) an update equal to the
//! stored value is dropped silently. Applied updates are broadcast to every
//! subscriber, in subscription order.
//!
//! ## Effects
//!
//! An Effect is a read function plus a change callback. The read function
//! runs with a [`Tracker`]; every atom read through it becomes a
//! dependency. When a dependency applies an update the read runs again and
//! the callback receives the result.
//!
//! ## Derived values
//!
//! A Derived is an atom computed from other atoms. It has its own distinct
//! gate, so its dependents only hear about changes to the computed output.
//!
//! # Implementation Notes
//!
//! Dependency tracking is explicit: read functions receive a `&Tracker`
//! instead of consulting a hidden "current computation". Equality is an
//! explicit [`Equality`] value chosen per atom.

mod atom;
mod context;
mod derived;
mod dispatch;
mod effect;
mod equality;
mod options;
mod subscriber;

pub use atom::Atom;
pub use context::{Notify, Readable, Source, Tracker};
pub use derived::Derived;
pub use dispatch::Dispatch;
pub use effect::{create_effect, Effect};
pub use equality::Equality;
pub use options::{AtomOptions, DEFAULT_MAX_CASCADE};
pub use subscriber::{AtomId, Listener, SubscriberId};
