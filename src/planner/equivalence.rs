//! Order-independent comparison of comma separated lists.
//!
//! Placement directives such as `"0,1"` and `"1, 0"` name the same machines;
//! they must compare equal so a reordering never shows up as drift.

use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Set of trimmed elements parsed from a comma separated string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnorderedStringSet(BTreeSet<String>);

impl UnorderedStringSet {
    /// Parses `value`, trimming every element. Empty elements are dropped.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        Self(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    /// Returns true if the set has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of distinct elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if `element` is in the set.
    #[must_use]
    pub fn contains(&self, element: &str) -> bool {
        self.0.contains(element)
    }

    /// Returns true if every element of `self` is also in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Iterates the elements in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromStr for UnorderedStringSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for UnorderedStringSet {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl fmt::Display for UnorderedStringSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.iter().collect();
        write!(f, "{}", joined.join(","))
    }
}

impl Serialize for UnorderedStringSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Returns true if `a` and `b` contain the same elements, ignoring order,
/// whitespace around elements, and duplicates.
#[must_use]
pub fn equal(a: &str, b: &str) -> bool {
    UnorderedStringSet::parse(a) == UnorderedStringSet::parse(b)
}

/// Returns true if `planned` names an element absent from `current`.
///
/// Dropping elements alone never forces a replacement.
#[must_use]
pub fn order_independent_requires_replace(planned: &str, current: &str) -> bool {
    !UnorderedStringSet::parse(planned).is_subset(&UnorderedStringSet::parse(current))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reordered_lists_are_equal() {
        assert!(equal("a,b", "b,a"));
        assert!(equal("0, 1,2", "2,1,0"));
    }

    #[test]
    fn test_duplicates_are_ignored() {
        assert!(equal("a, b,b", "b,a"));
    }

    #[test]
    fn test_different_elements_are_not_equal() {
        assert!(!equal("a,b", "a,c"));
        assert!(!equal("a", "a,b"));
    }

    #[test]
    fn test_empty_string_is_empty_set() {
        assert!(UnorderedStringSet::parse("").is_empty());
        assert!(equal("", ""));
        assert!(equal("", " , "));
        assert!(!equal("", "a"));
    }

    #[test]
    fn test_display_is_sorted() {
        let set: UnorderedStringSet = "c, a,b,a".parse().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.to_string(), "a,b,c");
        assert_eq!(UnorderedStringSet::from("b,a"), UnorderedStringSet::from("a , b"));
    }

    #[test]
    fn test_requires_replace_only_on_new_elements() {
        assert!(order_independent_requires_replace("0,1,2", "1,0"));
        assert!(!order_independent_requires_replace("1", "0,1"));
        assert!(!order_independent_requires_replace("1,0", "0,1"));
        assert!(!order_independent_requires_replace("", "0"));
    }
}
