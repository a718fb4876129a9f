//! Merge flag bitset and the table of caller-registered named flags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Behaviour bits carried by each traversal step of a merge.
    ///
    /// Flags are inherited by every descendant of the node they are attached
    /// to, and key directives can only add to them.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MergeFlags: u8 {
        /// Replace existing values instead of keeping them.
        const OVERWRITE = 1;
        /// Install nested keys into the enclosing container under
        /// slash-joined names.
        const FLATTEN = 2;
    }
}

impl MergeFlags {
    /// No flags set.
    pub const NONE: Self = Self::empty();

    /// Returns `true` if `OVERWRITE` is set.
    pub fn overwrites(self) -> bool {
        self.contains(Self::OVERWRITE)
    }

    /// Returns `true` if `FLATTEN` is set.
    pub fn flattens(self) -> bool {
        self.contains(Self::FLATTEN)
    }
}

impl Default for MergeFlags {
    fn default() -> Self {
        Self::NONE
    }
}

/// Named boolean switches consulted by conditional key directives.
///
/// A key carrying a directive that names a registered flag is merged only
/// while that flag is `true`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedFlags(BTreeMap<String, bool>);

impl NamedFlags {
    /// Create an empty flag table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update a flag, returning its previous value.
    pub fn set(&mut self, name: impl Into<String>, value: bool) -> Option<bool> {
        self.0.insert(name.into(), value)
    }

    /// The current value of a flag, or `None` if it was never registered.
    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(name).copied()
    }

    /// Number of registered flags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no flags are registered.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for NamedFlags {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<S: Into<String>> Extend<(S, bool)> for NamedFlags {
    fn extend<I: IntoIterator<Item = (S, bool)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.set(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_empty_and_default() {
        assert!(MergeFlags::NONE.is_empty());
        assert_eq!(MergeFlags::default(), MergeFlags::NONE);
        assert_eq!(MergeFlags::NONE.bits(), 0);
    }

    #[test]
    fn bit_values_are_stable() {
        assert_eq!(MergeFlags::OVERWRITE.bits(), 1);
        assert_eq!(MergeFlags::FLATTEN.bits(), 2);
        assert_eq!((MergeFlags::OVERWRITE | MergeFlags::FLATTEN).bits(), 3);
    }

    #[test]
    fn predicates_follow_bits() {
        let both = MergeFlags::OVERWRITE | MergeFlags::FLATTEN;
        assert!(both.overwrites());
        assert!(both.flattens());
        assert!(!MergeFlags::FLATTEN.overwrites());
        assert!(!MergeFlags::OVERWRITE.flattens());
    }

    #[test]
    fn set_returns_previous_value() {
        let mut flags = NamedFlags::new();
        assert_eq!(flags.set("debug", false), None);
        assert_eq!(flags.set("debug", true), Some(false));
        assert_eq!(flags.get("debug"), Some(true));
    }

    #[test]
    fn unregistered_flag_has_no_value() {
        let flags: NamedFlags = [("debug", false)].into_iter().collect();
        assert_eq!(flags.get("debug"), Some(false));
        assert_eq!(flags.get("trace"), None);
    }

    #[test]
    fn iter_is_name_ordered() {
        let flags: NamedFlags = [("b", true), ("a", false)].into_iter().collect();
        let pairs: Vec<(&str, bool)> = flags.iter().collect();
        assert_eq!(pairs, [("a", false), ("b", true)]);
    }

    #[test]
    fn extend_overrides_existing() {
        let mut flags: NamedFlags = [("a", false), ("b", true)].into_iter().collect();
        flags.extend([("a", true)]);
        assert_eq!(flags.len(), 2);
        assert_eq!(flags.get("a"), Some(true));
        assert_eq!(flags.get("b"), Some(true));
    }

    #[test]
    fn named_flags_serialize_as_plain_map() {
        let flags: NamedFlags = [("debug", true)].into_iter().collect();
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"{"debug":true}"#);
        let parsed: NamedFlags = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, flags);
    }
}
