//! Equality Strategies
//!
//! A distinct atom suppresses an update when its equality strategy says the
//! incoming value equals the stored one. The strategy is an explicit value
//! chosen when the atom is created rather than something dispatched through
//! operator overloading at update time.
//!
//! # Strategies
//!
//! - [`Equality::structural`]: `PartialEq`. Field-wise for derived structs,
//!   element-wise for `Vec`, slices and tuples. This is the default.
//! - [`Equality::by_key`]: compare a projection of the value, e.g. an ID.
//! - [`Equality::custom`]: any caller-supplied predicate.
//! - [`Equality::identity`]: pointer identity for `Arc` values.
//!
//! # Identity pitfall
//!
//! Identity comparison treats two separately allocated but otherwise equal
//! values as different. A distinct atom using it will notify whenever a new
//! allocation is supplied, even if the contents did not change. Nothing
//! fails; suppression is simply looser than structural equality would give.

use std::fmt;
use std::sync::Arc;

/// A pluggable equality predicate for values of type `T`.
pub struct Equality<T> {
    eq: Arc<dyn Fn(&T, &T) -> bool + Send + Sync>,
    kind: &'static str,
}

impl<T: 'static> Equality<T> {
    /// Use a caller-supplied predicate.
    pub fn custom<F>(eq: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            eq: Arc::new(eq),
            kind: "custom",
        }
    }

    /// Compare values by a projected key.
    ///
    /// ```rust,ignore
    /// let by_id = Equality::by_key(|order: &Order| order.id);
    /// ```
    pub fn by_key<K, F>(key: F) -> Self
    where
        K: PartialEq + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            eq: Arc::new(move |a: &T, b: &T| key(a) == key(b)),
            kind: "by_key",
        }
    }

    /// Evaluate the predicate.
    pub fn eq(&self, a: &T, b: &T) -> bool {
        (self.eq)(a, b)
    }

    /// Short name of the strategy, used in logs and `Debug` output.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl<T> Equality<T>
where
    T: PartialEq + 'static,
{
    /// Structural equality through `PartialEq`.
    pub fn structural() -> Self {
        Self {
            eq: Arc::new(|a: &T, b: &T| a == b),
            kind: "structural",
        }
    }
}

impl<U> Equality<Arc<U>>
where
    U: ?Sized + 'static,
{
    /// Pointer identity. See the module docs for the pitfall this carries.
    pub fn identity() -> Self {
        Self {
            eq: Arc::new(|a: &Arc<U>, b: &Arc<U>| Arc::ptr_eq(a, b)),
            kind: "identity",
        }
    }
}

impl<T> Default for Equality<T>
where
    T: PartialEq + 'static,
{
    fn default() -> Self {
        Self::structural()
    }
}

impl<T> Clone for Equality<T> {
    fn clone(&self) -> Self {
        Self {
            eq: Arc::clone(&self.eq),
            kind: self.kind,
        }
    }
}

impl<T> fmt::Debug for Equality<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Equality").field(&self.kind).finish()
    }
}
