//! Ordered set of string arguments (scopes, audiences, grant and response types).

use std::fmt;

use serde::{Deserialize, Serialize};

/// An insertion-ordered set of strings.
///
/// Duplicates are dropped on insertion, so the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Arguments(Vec<String>);

impl Arguments {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parses a space-delimited parameter value (`"openid offline"`).
    #[must_use]
    pub fn from_space_delimited(value: &str) -> Self {
        value.split_whitespace().collect()
    }

    /// Adds an item unless it is already present.
    pub fn append(&mut self, item: impl Into<String>) {
        let item = item.into();
        if !self.0.contains(&item) {
            self.0.push(item);
        }
    }

    /// Returns `true` if every given item is present.
    #[must_use]
    pub fn has_all(&self, items: &[&str]) -> bool {
        items.iter().all(|item| self.has(item))
    }

    /// Returns `true` if the item is present.
    #[must_use]
    pub fn has(&self, item: &str) -> bool {
        self.0.iter().any(|v| v == item)
    }

    /// Returns `true` if any of the given items is present.
    #[must_use]
    pub fn has_one_of(&self, items: &[&str]) -> bool {
        items.iter().any(|item| self.has(item))
    }

    /// Returns `true` if the set holds exactly this one item.
    #[must_use]
    pub fn exact_one(&self, item: &str) -> bool {
        self.0.len() == 1 && self.0[0] == item
    }

    /// Returns `true` if the set holds exactly these items, in any order.
    #[must_use]
    pub fn matches_exact(&self, items: &[&str]) -> bool {
        self.0.len() == items.len() && self.has_all(items)
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Borrows the items as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Joins items with single spaces, the wire format of `scope`.
    #[must_use]
    pub fn to_space_delimited(&self) -> String {
        self.0.join(" ")
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_space_delimited())
    }
}

impl From<Vec<String>> for Arguments {
    fn from(items: Vec<String>) -> Self {
        items.into_iter().collect()
    }
}

impl From<Arguments> for Vec<String> {
    fn from(args: Arguments) -> Self {
        args.0
    }
}

impl<S: Into<String>> FromIterator<S> for Arguments {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut args = Self::new();
        for item in iter {
            args.append(item);
        }
        args
    }
}

impl<'a> IntoIterator for &'a Arguments {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
