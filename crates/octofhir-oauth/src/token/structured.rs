//! JWT access tokens.
//!
//! Access tokens are self-contained JWTs that resource servers can verify
//! with the published JWKS. Refresh tokens and authorization codes stay
//! opaque and are delegated to an [`HmacShaStrategy`].

use std::sync::Arc;

use serde_json::Value;
use time::{Duration, OffsetDateTime};

use super::jwt::AccessTokenClaims;
use super::opaque::HmacShaStrategy;
use super::strategy::{
    AccessTokenStrategy, AuthorizeCodeStrategy, CoreStrategy, JwtStrategy, RefreshTokenStrategy,
};
use crate::types::{Request, TokenKind};
use crate::{OAuthError, OAuthResult};

/// Core strategy issuing JWT access tokens.
#[derive(Clone)]
pub struct JwtAccessTokenStrategy {
    jwt: Arc<dyn JwtStrategy>,
    hmac: Arc<HmacShaStrategy>,
    issuer: String,
}

impl JwtAccessTokenStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new(
        jwt: Arc<dyn JwtStrategy>,
        hmac: Arc<HmacShaStrategy>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            jwt,
            hmac,
            issuer: issuer.into(),
        }
    }

    fn claims(&self, request: &Request) -> AccessTokenClaims {
        let now = OffsetDateTime::now_utc();
        let expires_at = request
            .session
            .expires_at(TokenKind::AccessToken)
            .unwrap_or(now + self.hmac.lifespan(TokenKind::AccessToken));

        let sub = if request.session.subject.is_empty() {
            request.client.id.clone()
        } else {
            request.session.subject.clone()
        };

        AccessTokenClaims {
            iss: self.issuer.clone(),
            sub,
            aud: request.granted_audience.as_slice().to_vec(),
            exp: expires_at.unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: request.id.clone(),
            scope: request.granted_scopes.to_space_delimited(),
            client_id: request.client.id.clone(),
            ext: Default::default(),
        }
    }
}

impl std::fmt::Debug for JwtAccessTokenStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAccessTokenStrategy")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl AccessTokenStrategy for JwtAccessTokenStrategy {
    fn access_token_signature(&self, token: &str) -> String {
        self.jwt.signature(token)
    }

    fn generate_access_token(&self, request: &Request) -> OAuthResult<(String, String)> {
        let claims = serde_json::to_value(self.claims(request))
            .map_err(|e| OAuthError::signing(e.to_string()))?;
        let token = self.jwt.generate(&claims)?;
        let signature = self.jwt.signature(&token);
        Ok((token, signature))
    }

    fn validate_access_token(&self, _request: &Request, token: &str) -> OAuthResult<()> {
        let claims = self.jwt.validate(token)?;
        match claims.get("client_id") {
            Some(Value::String(_)) => Ok(()),
            _ => Err(OAuthError::request_unauthorized()
                .with_hint("Token is not an access token issued by this server.")),
        }
    }
}

impl RefreshTokenStrategy for JwtAccessTokenStrategy {
    fn refresh_token_signature(&self, token: &str) -> String {
        self.hmac.refresh_token_signature(token)
    }

    fn generate_refresh_token(&self, request: &Request) -> OAuthResult<(String, String)> {
        self.hmac.generate_refresh_token(request)
    }

    fn validate_refresh_token(&self, request: &Request, token: &str) -> OAuthResult<()> {
        self.hmac.validate_refresh_token(request, token)
    }
}

impl AuthorizeCodeStrategy for JwtAccessTokenStrategy {
    fn authorize_code_signature(&self, code: &str) -> String {
        self.hmac.authorize_code_signature(code)
    }

    fn generate_authorize_code(&self, request: &Request) -> OAuthResult<(String, String)> {
        self.hmac.generate_authorize_code(request)
    }

    fn validate_authorize_code(&self, request: &Request, code: &str) -> OAuthResult<()> {
        self.hmac.validate_authorize_code(request, code)
    }
}

impl CoreStrategy for JwtAccessTokenStrategy {
    fn lifespan(&self, kind: TokenKind) -> Duration {
        self.hmac.lifespan(kind)
    }
}
