//! Remote JWKS fetching with caching.
//!
//! Used to resolve the public keys of `private_key_jwt` clients that register
//! a `jwks_uri` instead of inline keys.
//!
//! # Cache-Control Support
//!
//! The cache TTL follows `Cache-Control: max-age=N` when the response carries
//! it, bounded by the configured maximum. Otherwise the configured default
//! applies.
//!
//! # Security Considerations
//!
//! - Only HTTPS locations are fetched unless `allow_http` is set
//! - Every request is bounded by the configured timeout
//! - Responses larger than the configured maximum are rejected

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::RwLock;
use url::Url;

use crate::config::JwksFetcherConfig;
use crate::{OAuthError, OAuthResult};

/// Resolves a JWKS location to a key set.
#[async_trait]
pub trait JwksFetcherStrategy: Send + Sync {
    /// Returns the key set at `location`.
    ///
    /// With `ignore_cache` set, the location is fetched even when a fresh
    /// cached copy exists; callers use this after a `kid` lookup misses.
    ///
    /// # Errors
    ///
    /// Returns a server error carrying the [`JwksError`] as debug detail.
    async fn resolve(&self, location: &str, ignore_cache: bool) -> OAuthResult<JwkSet>;
}

/// Errors that can occur while fetching a JWKS.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// The location is not a valid URL.
    #[error("Invalid JWKS location: {0}")]
    InvalidLocation(String),

    /// The location scheme is not allowed.
    #[error("Invalid URL scheme: only HTTPS is allowed")]
    InvalidScheme,

    /// A network error occurred.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The request did not complete in time.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success status.
    #[error("HTTP error: status {0}")]
    HttpError(u16),

    /// The body is not a JWKS document.
    #[error("Failed to parse JWKS: {0}")]
    ParseError(String),

    /// The body exceeds the configured maximum.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

impl From<JwksError> for OAuthError {
    fn from(err: JwksError) -> Self {
        OAuthError::server_error()
            .with_hint("Unable to fetch JSON Web Keys.")
            .with_debug(err.to_string())
    }
}

struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

/// HTTP fetcher with an in-memory TTL cache keyed by location.
pub struct DefaultJwksFetcherStrategy {
    http_client: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, CachedJwks>>>,
    config: JwksFetcherConfig,
}

impl DefaultJwksFetcherStrategy {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(config: JwksFetcherConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            cache: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    async fn cached(&self, key: &str) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        cache
            .get(key)
            .filter(|c| Instant::now() < c.expires_at)
            .map(|c| c.jwks.clone())
    }

    async fn fetch(&self, location: &Url) -> Result<(JwkSet, Duration), JwksError> {
        match location.scheme() {
            "https" => {}
            "http" if self.config.allow_http => {}
            _ => return Err(JwksError::InvalidScheme),
        }

        tracing::debug!(location = %location, "Fetching JWKS");

        let response = self
            .http_client
            .get(location.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(location = %location, error = %e, "Failed to fetch JWKS");
                if e.is_timeout() {
                    JwksError::Timeout(self.config.request_timeout)
                } else {
                    JwksError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(JwksError::HttpError(response.status().as_u16()));
        }

        if response
            .content_length()
            .is_some_and(|len| len as usize > self.config.max_response_size)
        {
            return Err(JwksError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let ttl = self.ttl_from_headers(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| JwksError::NetworkError(e.to_string()))?;
        if body.len() > self.config.max_response_size {
            return Err(JwksError::ResponseTooLarge {
                max_size: self.config.max_response_size,
            });
        }

        let jwks: JwkSet =
            serde_json::from_slice(&body).map_err(|e| JwksError::ParseError(e.to_string()))?;

        Ok((jwks, ttl))
    }

    fn ttl_from_headers(&self, headers: &reqwest::header::HeaderMap) -> Duration {
        headers
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.split(',').find_map(|directive| {
                    directive
                        .trim()
                        .strip_prefix("max-age=")
                        .and_then(|s| s.parse::<u64>().ok())
                })
            })
            .map(Duration::from_secs)
            .unwrap_or(self.config.cache_ttl)
            .min(self.config.max_cache_ttl)
    }

    /// Drops every cached key set.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    /// Number of cached locations.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl JwksFetcherStrategy for DefaultJwksFetcherStrategy {
    async fn resolve(&self, location: &str, ignore_cache: bool) -> OAuthResult<JwkSet> {
        let url = Url::parse(location).map_err(|e| JwksError::InvalidLocation(e.to_string()))?;
        let key = url.as_str().trim_end_matches('/').to_string();

        if !ignore_cache {
            if let Some(jwks) = self.cached(&key).await {
                tracing::trace!(location, "JWKS cache hit");
                return Ok(jwks);
            }
        }

        let (jwks, ttl) = self.fetch(&url).await?;
        tracing::debug!(location, keys = jwks.keys.len(), ttl = ?ttl, "Cached JWKS");

        self.cache.write().await.insert(
            key,
            CachedJwks {
                jwks: jwks.clone(),
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(jwks)
    }
}
