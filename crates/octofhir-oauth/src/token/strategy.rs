//! Token strategy traits.
//!
//! Handlers never touch key material. They ask a strategy for a token and
//! its signature, persist the signature, and later hand the presented token
//! back to the same strategy for validation.

use std::sync::Arc;

use serde_json::{Map, Value};
use time::Duration;

use super::jwt::{JwtError, Jwks};
use crate::OAuthResult;
use crate::config::ProviderConfig;
use crate::types::{Request, TokenKind};

/// Issues and validates access tokens.
pub trait AccessTokenStrategy: Send + Sync {
    /// Returns the storage key of a token.
    fn access_token_signature(&self, token: &str) -> String;

    /// Generates a token for the request. Returns `(token, signature)`.
    ///
    /// # Errors
    ///
    /// Returns a signing error if the token cannot be produced.
    fn generate_access_token(&self, request: &Request) -> OAuthResult<(String, String)>;

    /// Validates a presented token against the request it was issued for.
    ///
    /// # Errors
    ///
    /// Returns `token_expired` or `token_signature_mismatch`.
    fn validate_access_token(&self, request: &Request, token: &str) -> OAuthResult<()>;
}

/// Issues and validates refresh tokens.
pub trait RefreshTokenStrategy: Send + Sync {
    /// Returns the storage key of a token.
    fn refresh_token_signature(&self, token: &str) -> String;

    /// Generates a token for the request. Returns `(token, signature)`.
    ///
    /// # Errors
    ///
    /// Returns a signing error if the token cannot be produced.
    fn generate_refresh_token(&self, request: &Request) -> OAuthResult<(String, String)>;

    /// Validates a presented token against the request it was issued for.
    ///
    /// # Errors
    ///
    /// Returns `token_expired` or `token_signature_mismatch`.
    fn validate_refresh_token(&self, request: &Request, token: &str) -> OAuthResult<()>;
}

/// Issues and validates authorization codes.
pub trait AuthorizeCodeStrategy: Send + Sync {
    /// Returns the storage key of a code.
    fn authorize_code_signature(&self, code: &str) -> String;

    /// Generates a code for the request. Returns `(code, signature)`.
    ///
    /// # Errors
    ///
    /// Returns a signing error if the code cannot be produced.
    fn generate_authorize_code(&self, request: &Request) -> OAuthResult<(String, String)>;

    /// Validates a presented code against the request it was issued for.
    ///
    /// # Errors
    ///
    /// Returns `token_expired` or `token_signature_mismatch`.
    fn validate_authorize_code(&self, request: &Request, code: &str) -> OAuthResult<()>;
}

/// The three OAuth2 token kinds plus their configured lifespans.
pub trait CoreStrategy: AccessTokenStrategy + RefreshTokenStrategy + AuthorizeCodeStrategy {
    /// Lifespan applied when a session carries no explicit expiry.
    fn lifespan(&self, kind: TokenKind) -> Duration;
}

/// Issues OpenID Connect ID tokens.
pub trait OpenIdConnectTokenStrategy: Send + Sync {
    /// Signs an ID token for the request's session.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for a weak nonce and `server_error` when the
    /// session carries no ID token claims.
    fn generate_id_token(&self, request: &Request) -> OAuthResult<String>;
}

/// Generic JWT signer shared by access tokens and ID tokens.
pub trait JwtStrategy: Send + Sync {
    /// Signs a claims object.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    fn generate(&self, claims: &Value) -> Result<String, JwtError>;

    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, expired or not signed by
    /// this signer.
    fn validate(&self, token: &str) -> Result<Map<String, Value>, JwtError>;

    /// The signature segment of a token.
    fn signature(&self, token: &str) -> String {
        token.rsplit('.').next().unwrap_or_default().to_string()
    }

    /// The public keys tokens are verified with.
    fn jwks(&self) -> Jwks;
}

/// Lifespans per token kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifespans {
    /// Access token lifespan.
    pub access_token: Duration,
    /// Refresh token lifespan.
    pub refresh_token: Duration,
    /// Authorization code lifespan.
    pub authorize_code: Duration,
    /// ID token lifespan.
    pub id_token: Duration,
}

impl Lifespans {
    /// Reads the lifespans from configuration.
    #[must_use]
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            access_token: config.lifespan(TokenKind::AccessToken),
            refresh_token: config.lifespan(TokenKind::RefreshToken),
            authorize_code: config.lifespan(TokenKind::AuthorizeCode),
            id_token: config.lifespan(TokenKind::IdToken),
        }
    }

    /// Lifespan of one kind.
    #[must_use]
    pub fn get(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::AccessToken => self.access_token,
            TokenKind::RefreshToken => self.refresh_token,
            TokenKind::AuthorizeCode => self.authorize_code,
            TokenKind::IdToken => self.id_token,
        }
    }
}

impl Default for Lifespans {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default())
    }
}

/// The strategies every handler is built from.
///
/// Each member is owned independently, so a JWT core strategy and an
/// HMAC-based one can share the same ID token signer.
#[derive(Clone)]
pub struct CommonStrategy {
    core: Arc<dyn CoreStrategy>,
    openid: Arc<dyn OpenIdConnectTokenStrategy>,
    jwt: Arc<dyn JwtStrategy>,
}

impl CommonStrategy {
    /// Groups the three strategies.
    #[must_use]
    pub fn new(
        core: Arc<dyn CoreStrategy>,
        openid: Arc<dyn OpenIdConnectTokenStrategy>,
        jwt: Arc<dyn JwtStrategy>,
    ) -> Self {
        Self { core, openid, jwt }
    }

    /// Access, refresh and authorization code strategy.
    #[must_use]
    pub fn core(&self) -> &Arc<dyn CoreStrategy> {
        &self.core
    }

    /// ID token strategy.
    #[must_use]
    pub fn openid(&self) -> &Arc<dyn OpenIdConnectTokenStrategy> {
        &self.openid
    }

    /// JWT signer.
    #[must_use]
    pub fn jwt(&self) -> &Arc<dyn JwtStrategy> {
        &self.jwt
    }
}

impl std::fmt::Debug for CommonStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommonStrategy").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifespans_from_config() {
        let lifespans = Lifespans::default();
        assert_eq!(lifespans.get(TokenKind::AccessToken), Duration::hours(1));
        assert_eq!(lifespans.get(TokenKind::AuthorizeCode), Duration::minutes(15));
        assert_eq!(lifespans.get(TokenKind::RefreshToken), Duration::days(30));
    }
}
