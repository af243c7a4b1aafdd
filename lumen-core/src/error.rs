//! Error types for the reactive core.
//!
//! Reading and writing atoms never fails. Errors only come from loading
//! configuration and from update cascades that refuse to settle.

use thiserror::Error;

use crate::reactive::AtomId;

/// Errors surfaced by the reactive core.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// Atom options could not be parsed.
    #[error("invalid atom options: {0}")]
    Options(#[from] serde_json::Error),

    /// Listeners kept re-setting the atom for more passes than allowed.
    #[error("atom {atom} still changing after {passes} notification passes")]
    CascadeLimit {
        /// The atom whose notification loop was cut short.
        atom: AtomId,
        /// Number of passes that were delivered.
        passes: u32,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
