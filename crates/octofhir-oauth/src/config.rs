//! Provider configuration.
//!
//! A single [`ProviderConfig`] record feeds the composition factories and the
//! provider facade: token lifespans, issuers, secrets, error exposure flags
//! and strategy selection.
//!
//! # Example (TOML)
//!
//! ```toml
//! access_token_lifespan = "1h"
//! refresh_token_lifespan = "30d"
//! id_token_issuer = "https://auth.example.com"
//! token_url = "https://auth.example.com/oauth2/token"
//! scope_strategy = "wildcard"
//!
//! [jwks]
//! request_timeout = "10s"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::TokenKind;

/// Default minimum length of `state` and `nonce` parameters.
pub const DEFAULT_MIN_PARAMETER_ENTROPY: usize = 8;

/// Minimum length of HMAC secrets, in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Root provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Access token lifespan.
    #[serde(with = "humantime_serde")]
    pub access_token_lifespan: Duration,

    /// Refresh token lifespan.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifespan: Duration,

    /// Authorization code lifespan.
    #[serde(with = "humantime_serde")]
    pub authorize_code_lifespan: Duration,

    /// ID token lifespan.
    #[serde(with = "humantime_serde")]
    pub id_token_lifespan: Duration,

    /// `iss` claim of issued ID tokens.
    pub id_token_issuer: String,

    /// `iss` claim of JWT access tokens.
    pub access_token_issuer: String,

    /// Minimum length of `state` and `nonce`. Zero selects the default.
    pub min_parameter_entropy: usize,

    /// Number of random bytes in opaque tokens.
    pub token_entropy: usize,

    /// Current HMAC secret for opaque tokens.
    #[serde(skip_serializing)]
    pub global_secret: Option<String>,

    /// Retired HMAC secrets still accepted for validation, newest first.
    #[serde(skip_serializing)]
    pub rotated_global_secrets: Vec<String>,

    /// Include debug detail in errors sent to clients.
    pub send_debug_messages_to_clients: bool,

    /// Emit `error_hint` / `error_debug` as separate fields.
    pub use_legacy_error_format: bool,

    /// Token endpoint URL, the required audience of client assertions.
    pub token_url: String,

    /// Override for the `form_post` response page.
    ///
    /// `{redirect_uri}` and `{form_fields}` are substituted.
    pub form_post_html_template: Option<String>,

    /// Scope matching strategy.
    pub scope_strategy: ScopeStrategyKind,

    /// Audience matching strategy.
    pub audience_strategy: AudienceStrategyKind,

    /// Scopes that make the authorization code and refresh grants issue refresh tokens.
    pub refresh_token_scopes: Vec<String>,

    /// Only introspect access tokens.
    pub disable_refresh_token_validation: bool,

    /// Form parameters removed from requests before they are persisted.
    pub redacted_parameters: Vec<String>,

    /// JWKS fetcher settings.
    pub jwks: JwksFetcherConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            access_token_lifespan: Duration::from_secs(3600), // 1 hour
            refresh_token_lifespan: Duration::from_secs(30 * 24 * 3600), // 30 days
            authorize_code_lifespan: Duration::from_secs(15 * 60), // 15 minutes
            id_token_lifespan: Duration::from_secs(3600),
            id_token_issuer: String::new(),
            access_token_issuer: String::new(),
            min_parameter_entropy: DEFAULT_MIN_PARAMETER_ENTROPY,
            token_entropy: 32,
            global_secret: None,
            rotated_global_secrets: Vec::new(),
            send_debug_messages_to_clients: false,
            use_legacy_error_format: false,
            token_url: String::new(),
            form_post_html_template: None,
            scope_strategy: ScopeStrategyKind::default(),
            audience_strategy: AudienceStrategyKind::default(),
            refresh_token_scopes: vec!["offline".to_string(), "offline_access".to_string()],
            disable_refresh_token_validation: false,
            redacted_parameters: Vec::new(),
            jwks: JwksFetcherConfig::default(),
        }
    }
}

/// Scope matching strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStrategyKind {
    /// Literal equality.
    Exact,
    /// Dot-separated prefixes (`foo` grants `foo.bar`).
    #[default]
    Hierarchic,
    /// Dot-separated segments with `*` wildcards.
    Wildcard,
}

/// Audience matching strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceStrategyKind {
    /// URL prefix matching on scheme, host and path.
    #[default]
    Default,
    /// Literal equality.
    Exact,
}

/// JWKS fetcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwksFetcherConfig {
    /// HTTP request timeout.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Cache TTL used when the response carries no `max-age`.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Upper bound on any cache TTL.
    #[serde(with = "humantime_serde")]
    pub max_cache_ttl: Duration,

    /// Maximum accepted response size in bytes.
    pub max_response_size: usize,

    /// Allow plain HTTP locations (tests only).
    pub allow_http: bool,
}

impl Default for JwksFetcherConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(3600),
            max_cache_ttl: Duration::from_secs(24 * 3600),
            max_response_size: 1024 * 1024,
            allow_http: false,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl ProviderConfig {
    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed TOML and any error from
    /// [`ProviderConfig::validate`].
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Effective minimum parameter entropy.
    #[must_use]
    pub fn min_parameter_entropy(&self) -> usize {
        if self.min_parameter_entropy == 0 {
            DEFAULT_MIN_PARAMETER_ENTROPY
        } else {
            self.min_parameter_entropy
        }
    }

    /// Lifespan for a token kind, as a signed duration.
    #[must_use]
    pub fn lifespan(&self, kind: TokenKind) -> time::Duration {
        let lifespan = match kind {
            TokenKind::AccessToken => self.access_token_lifespan,
            TokenKind::RefreshToken => self.refresh_token_lifespan,
            TokenKind::AuthorizeCode => self.authorize_code_lifespan,
            TokenKind::IdToken => self.id_token_lifespan,
        };
        to_signed(lifespan)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - a token lifespan is zero
    /// - `token_entropy` is below 32 bytes
    /// - a configured secret is shorter than 32 bytes
    /// - `token_url` is set but is not an absolute URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, lifespan) in [
            ("access_token_lifespan", self.access_token_lifespan),
            ("authorize_code_lifespan", self.authorize_code_lifespan),
            ("id_token_lifespan", self.id_token_lifespan),
        ] {
            if lifespan.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        if self.token_entropy < 32 {
            return Err(ConfigError::InvalidValue(format!(
                "token_entropy must be at least 32 bytes, got {}",
                self.token_entropy
            )));
        }

        if self
            .global_secret
            .as_ref()
            .is_some_and(|s| s.len() < MIN_SECRET_LENGTH)
        {
            return Err(ConfigError::InvalidValue(format!(
                "global_secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        if self
            .rotated_global_secrets
            .iter()
            .any(|s| s.len() < MIN_SECRET_LENGTH)
        {
            return Err(ConfigError::InvalidValue(format!(
                "rotated_global_secrets entries must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        if !self.token_url.is_empty() {
            url::Url::parse(&self.token_url).map_err(|e| {
                ConfigError::InvalidValue(format!("token_url '{}': {e}", self.token_url))
            })?;
        }

        Ok(())
    }
}

/// Converts a configured lifespan into a signed duration, saturating.
#[must_use]
pub fn to_signed(duration: Duration) -> time::Duration {
    time::Duration::try_from(duration).unwrap_or(time::Duration::MAX)
}
