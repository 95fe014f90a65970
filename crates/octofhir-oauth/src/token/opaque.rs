//! Opaque core strategy backed by [`HmacStrategy`].

use time::{Duration, OffsetDateTime};

use super::hmac::HmacStrategy;
use super::strategy::{
    AccessTokenStrategy, AuthorizeCodeStrategy, CoreStrategy, Lifespans, RefreshTokenStrategy,
};
use crate::types::{Request, TokenKind};
use crate::{OAuthError, OAuthResult};

/// Access tokens, refresh tokens and authorization codes as HMAC tokens.
///
/// Expiry is not encoded in the token. It is read from the session stored
/// with the signature, falling back to `requested_at + lifespan`.
#[derive(Debug, Clone)]
pub struct HmacShaStrategy {
    hmac: HmacStrategy,
    lifespans: Lifespans,
}

impl HmacShaStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new(hmac: HmacStrategy, lifespans: Lifespans) -> Self {
        Self { hmac, lifespans }
    }

    fn check_expiry(&self, request: &Request, kind: TokenKind) -> OAuthResult<()> {
        let expires_at = request
            .session
            .expires_at(kind)
            .unwrap_or(request.requested_at + self.lifespans.get(kind));

        if expires_at < OffsetDateTime::now_utc() {
            let label = match kind {
                TokenKind::AccessToken => "Access token",
                TokenKind::RefreshToken => "Refresh token",
                TokenKind::AuthorizeCode => "Authorize code",
                TokenKind::IdToken => "ID token",
            };
            return Err(OAuthError::token_expired().with_hint(format!(
                "{label} expired at '{expires_at}'."
            )));
        }
        Ok(())
    }

    fn validate(&self, request: &Request, kind: TokenKind, token: &str) -> OAuthResult<()> {
        self.check_expiry(request, kind)?;
        self.hmac.validate(token)
    }
}

impl AccessTokenStrategy for HmacShaStrategy {
    fn access_token_signature(&self, token: &str) -> String {
        self.hmac.signature(token)
    }

    fn generate_access_token(&self, _request: &Request) -> OAuthResult<(String, String)> {
        self.hmac.generate()
    }

    fn validate_access_token(&self, request: &Request, token: &str) -> OAuthResult<()> {
        self.validate(request, TokenKind::AccessToken, token)
    }
}

impl RefreshTokenStrategy for HmacShaStrategy {
    fn refresh_token_signature(&self, token: &str) -> String {
        self.hmac.signature(token)
    }

    fn generate_refresh_token(&self, _request: &Request) -> OAuthResult<(String, String)> {
        self.hmac.generate()
    }

    fn validate_refresh_token(&self, request: &Request, token: &str) -> OAuthResult<()> {
        self.validate(request, TokenKind::RefreshToken, token)
    }
}

impl AuthorizeCodeStrategy for HmacShaStrategy {
    fn authorize_code_signature(&self, code: &str) -> String {
        self.hmac.signature(code)
    }

    fn generate_authorize_code(&self, _request: &Request) -> OAuthResult<(String, String)> {
        self.hmac.generate()
    }

    fn validate_authorize_code(&self, request: &Request, code: &str) -> OAuthResult<()> {
        self.validate(request, TokenKind::AuthorizeCode, code)
    }
}

impl CoreStrategy for HmacShaStrategy {
    fn lifespan(&self, kind: TokenKind) -> Duration {
        self.lifespans.get(kind)
    }
}
