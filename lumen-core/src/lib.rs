//! Lumen Core
//!
//! This crate provides reactive atoms with distinct-value gating. It
//! implements:
//!
//! - Atoms: typed state cells that suppress no-op updates
//! - Effects: callbacks that re-run when the atoms they read change
//! - Derived values: atoms computed from other atoms, gated the same way
//!
//! # Architecture
//!
//! - `reactive`: atoms, effects, derived values and dependency tracking
//! - `error`: the crate's error type
//!
//! # Example
//!
//! ```rust,ignore
//! use lumen_core::reactive::{Atom, AtomOptions, Effect};
//!
//! // Distinct by default: equal updates are dropped
//! let units = Atom::new(0);
//!
//! // A pulse that should fire every time, equal or not
//! let refresh = Atom::with_options((), AtomOptions::new().distinct(false));
//!
//! let (u, r) = (units.clone(), refresh.clone());
//! let effect = Effect::new(
//!     move |cx| {
//!         cx.get(&r);
//!         cx.get(&u)
//!     },
//!     |units| println!("units: {units}"),
//! );
//!
//! units.set(0);     // suppressed, prints nothing
//! units.set(3);     // prints "units: 3"
//! refresh.set(());  // prints "units: 3" again
//! ```

pub mod error;
pub mod reactive;

pub use error::{ReactiveError, Result};
