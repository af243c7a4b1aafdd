//! Atom configuration.
//!
//! Options are fixed when an atom is created. They can be built in code or
//! loaded from JSON, which makes it possible to keep gating behavior for a
//! set of atoms in a config file:
//!
//! ```json
//! { "distinct": false, "label": "live_ticks", "max_cascade": 16 }
//! ```

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default bound on notification passes triggered by one `set`.
pub const DEFAULT_MAX_CASCADE: NonZeroU32 = match NonZeroU32::new(64) {
    Some(bound) => bound,
    None => panic!("cascade bound must be non-zero"),
};

fn default_distinct() -> bool {
    true
}

fn default_max_cascade() -> NonZeroU32 {
    DEFAULT_MAX_CASCADE
}

/// Creation-time configuration for an atom or derived value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomOptions {
    /// Suppress updates whose value equals the stored one.
    #[serde(default = "default_distinct")]
    pub distinct: bool,

    /// Name used in logs and `Debug` output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Maximum notification passes a single `set` may drive when listeners
    /// keep re-setting the same atom. Zero is unrepresentable, so a zero in
    /// JSON is a parse error.
    #[serde(default = "default_max_cascade")]
    pub max_cascade: NonZeroU32,
}

impl AtomOptions {
    /// Default options: distinct, unlabeled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the distinct flag.
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Attach a diagnostic label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Bound the number of passes one `set` may drive.
    pub fn max_cascade(mut self, max_cascade: NonZeroU32) -> Self {
        self.max_cascade = max_cascade;
        self
    }

    /// Parse options from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for AtomOptions {
    fn default() -> Self {
        Self {
            distinct: default_distinct(),
            label: None,
            max_cascade: DEFAULT_MAX_CASCADE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReactiveError;

    fn bound(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn defaults_are_distinct_and_bounded() {
        let options = AtomOptions::default();
        assert!(options.distinct);
        assert_eq!(options.label, None);
        assert_eq!(options.max_cascade, DEFAULT_MAX_CASCADE);
        assert_eq!(options.max_cascade.get(), 64);
    }

    #[test]
    fn builder_sets_fields() {
        let options = AtomOptions::new().distinct(false).label("revenue").max_cascade(bound(3));
        assert!(!options.distinct);
        assert_eq!(options.label.as_deref(), Some("revenue"));
        assert_eq!(options.max_cascade.get(), 3);
    }

    #[test]
    fn empty_json_uses_defaults() {
        let options = AtomOptions::from_json("{}").unwrap();
        assert_eq!(options, AtomOptions::default());
    }

    #[test]
    fn json_overrides_fields() {
        let options =
            AtomOptions::from_json(r#"{"distinct": false, "label": "ticks", "max_cascade": 8}"#)
                .unwrap();
        assert!(!options.distinct);
        assert_eq!(options.label.as_deref(), Some("ticks"));
        assert_eq!(options.max_cascade.get(), 8);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = AtomOptions::from_json(r#"{"distinkt": false}"#).unwrap_err();
        assert!(matches!(err, ReactiveError::Options(_)));
    }

    #[test]
    fn zero_cascade_is_rejected() {
        let err = AtomOptions::from_json(r#"{"max_cascade": 0}"#).unwrap_err();
        assert!(matches!(err, ReactiveError::Options(_)));
        assert!(err.to_string().contains("nonzero") || err.to_string().contains("non-zero"));
    }

    #[test]
    fn to_json_skips_missing_label() {
        let json = AtomOptions::default().to_json().unwrap();
        assert!(!json.contains("label"));
        assert_eq!(AtomOptions::from_json(&json).unwrap(), AtomOptions::default());
    }
}
