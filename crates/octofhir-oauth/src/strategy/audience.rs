//! Audience matching strategies.

use std::sync::Arc;

use url::Url;

use crate::config::AudienceStrategyKind;
use crate::{OAuthError, OAuthResult};

/// Checks requested audiences against a client's allowed set.
pub trait AudienceMatchingStrategy: Send + Sync {
    /// Succeeds if every entry of `needle` is permitted by `haystack`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` naming the first audience that is not allowed.
    fn check(&self, haystack: &[String], needle: &[String]) -> OAuthResult<()>;
}

/// URL-aware matching.
///
/// An allowed `https://api.example.com/v1` permits the same URL, with or
/// without a trailing slash, and any path below it. Scheme and host must be
/// identical. Values that are not absolute URLs compare literally.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAudienceMatchingStrategy;

impl DefaultAudienceMatchingStrategy {
    fn url_matches(allowed: &Url, requested: &Url) -> bool {
        if allowed.scheme() != requested.scheme() || allowed.host_str() != requested.host_str() {
            return false;
        }
        if allowed.port_or_known_default() != requested.port_or_known_default() {
            return false;
        }

        let allowed_path = allowed.path().trim_end_matches('/');
        let requested_path = requested.path();

        requested_path == allowed.path()
            || requested_path == allowed_path
            || requested_path
                .strip_prefix(allowed_path)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl AudienceMatchingStrategy for DefaultAudienceMatchingStrategy {
    fn check(&self, haystack: &[String], needle: &[String]) -> OAuthResult<()> {
        for requested in needle {
            let requested_url = Url::parse(requested).ok();

            let found = haystack.iter().any(|allowed| {
                match (&requested_url, Url::parse(allowed).ok()) {
                    (Some(r), Some(a)) => Self::url_matches(&a, r),
                    _ => allowed == requested,
                }
            });

            if !found {
                return Err(OAuthError::invalid_request().with_hint(format!(
                    "Requested audience '{requested}' has not been whitelisted by the OAuth 2.0 Client."
                )));
            }
        }
        Ok(())
    }
}

/// Literal equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactAudienceMatchingStrategy;

impl AudienceMatchingStrategy for ExactAudienceMatchingStrategy {
    fn check(&self, haystack: &[String], needle: &[String]) -> OAuthResult<()> {
        match needle.iter().find(|n| !haystack.contains(n)) {
            Some(requested) => Err(OAuthError::invalid_request().with_hint(format!(
                "Requested audience '{requested}' has not been whitelisted by the OAuth 2.0 Client."
            ))),
            None => Ok(()),
        }
    }
}

/// Builds the strategy named in configuration.
#[must_use]
pub fn audience_strategy(kind: AudienceStrategyKind) -> Arc<dyn AudienceMatchingStrategy> {
    match kind {
        AudienceStrategyKind::Default => Arc::new(DefaultAudienceMatchingStrategy),
        AudienceStrategyKind::Exact => Arc::new(ExactAudienceMatchingStrategy),
    }
}
