//! Scope matching strategies.
//!
//! A strategy answers one question: does a set of allowed scopes (the
//! haystack) permit a requested scope (the needle)?

use std::sync::Arc;

use crate::config::ScopeStrategyKind;

/// Decides whether a requested scope is covered by an allowed set.
pub trait ScopeStrategy: Send + Sync {
    /// Returns `true` if `needle` is permitted by `haystack`.
    fn matches(&self, haystack: &[String], needle: &str) -> bool;
}

/// Literal equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactScopeStrategy;

impl ScopeStrategy for ExactScopeStrategy {
    fn matches(&self, haystack: &[String], needle: &str) -> bool {
        haystack.iter().any(|s| s == needle)
    }
}

/// Dot-separated hierarchy: `foo` grants `foo.bar` and `foo.bar.baz`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchicScopeStrategy;

impl ScopeStrategy for HierarchicScopeStrategy {
    fn matches(&self, haystack: &[String], needle: &str) -> bool {
        haystack.iter().any(|allowed| {
            if allowed == needle {
                return true;
            }
            // `picture.read` never grants `picture`
            if allowed.len() > needle.len() {
                return false;
            }
            let allowed_parts: Vec<&str> = allowed.split('.').collect();
            let needle_parts: Vec<&str> = needle.split('.').collect();
            needle_parts.len() > allowed_parts.len()
                && allowed_parts
                    .iter()
                    .zip(&needle_parts)
                    .all(|(a, n)| a == n)
        })
    }
}

/// Dot-separated segments where `*` matches any one non-empty segment.
///
/// A trailing `*` on a shorter pattern also matches every deeper scope, so
/// `read.*` grants both `read.users` and `read.users.email`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardScopeStrategy;

impl ScopeStrategy for WildcardScopeStrategy {
    fn matches(&self, haystack: &[String], needle: &str) -> bool {
        let needle_parts: Vec<&str> = needle.split('.').collect();

        haystack.iter().any(|pattern| {
            let pattern_parts: Vec<&str> = pattern.split('.').collect();
            if pattern_parts.len() > needle_parts.len() {
                return false;
            }

            let last = pattern_parts.len() - 1;
            pattern_parts.iter().enumerate().all(|(i, part)| {
                if i == last && pattern_parts.len() != needle_parts.len() && *part != "*" {
                    return false;
                }
                if *part == "*" {
                    !needle_parts[i].is_empty()
                } else {
                    *part == needle_parts[i]
                }
            })
        })
    }
}

/// Builds the strategy named in configuration.
#[must_use]
pub fn scope_strategy(kind: ScopeStrategyKind) -> Arc<dyn ScopeStrategy> {
    match kind {
        ScopeStrategyKind::Exact => Arc::new(ExactScopeStrategy),
        ScopeStrategyKind::Hierarchic => Arc::new(HierarchicScopeStrategy),
        ScopeStrategyKind::Wildcard => Arc::new(WildcardScopeStrategy),
    }
}
