//! Default ID token strategy.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::token::{JwtStrategy, OpenIdConnectTokenStrategy};
use crate::types::{Request, TokenKind};
use crate::{OAuthError, OAuthResult};

/// Builds ID token claims from the session and signs them with a JWT signer.
///
/// Claims set by the caller win, except `aud` which always contains the
/// client id and `exp`/`iat` which are computed here.
#[derive(Clone)]
pub struct DefaultOpenIdStrategy {
    jwt: Arc<dyn JwtStrategy>,
    issuer: String,
    lifespan: Duration,
    min_parameter_entropy: usize,
}

impl DefaultOpenIdStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new(
        jwt: Arc<dyn JwtStrategy>,
        issuer: impl Into<String>,
        lifespan: Duration,
        min_parameter_entropy: usize,
    ) -> Self {
        Self {
            jwt,
            issuer: issuer.into(),
            lifespan,
            min_parameter_entropy,
        }
    }
}

impl std::fmt::Debug for DefaultOpenIdStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultOpenIdStrategy")
            .field("issuer", &self.issuer)
            .field("lifespan", &self.lifespan)
            .finish_non_exhaustive()
    }
}

impl OpenIdConnectTokenStrategy for DefaultOpenIdStrategy {
    fn generate_id_token(&self, request: &Request) -> OAuthResult<String> {
        let session = &request.session;
        let mut claims = session.id_token_claims.clone().ok_or_else(|| {
            OAuthError::server_error().with_debug(
                "Failed to generate id token because the session carries no ID token claims.",
            )
        })?;

        if claims.sub.is_empty() {
            claims.sub = session.subject.clone();
        }
        if claims.sub.is_empty() {
            return Err(OAuthError::server_error()
                .with_debug("Failed to generate id token because subject is an empty string."));
        }

        if let Some(nonce) = request.form.get("nonce") {
            claims.nonce = Some(nonce.to_string());
        }
        if let Some(nonce) = &claims.nonce
            && nonce.len() < self.min_parameter_entropy
        {
            return Err(OAuthError::invalid_request().with_hint(format!(
                "Parameter 'nonce' is set but does not satisfy the minimum entropy of {} characters.",
                self.min_parameter_entropy
            )));
        }

        let now = OffsetDateTime::now_utc();
        let expires_at = session
            .expires_at(TokenKind::IdToken)
            .unwrap_or(now + self.lifespan);

        if claims.iss.is_empty() {
            claims.iss = self.issuer.clone();
        }
        if !claims.aud.contains(&request.client.id) {
            claims.aud.push(request.client.id.clone());
        }
        claims.exp = expires_at.unix_timestamp();
        claims.iat = now.unix_timestamp();
        if claims.jti.is_none() {
            claims.jti = Some(uuid::Uuid::new_v4().to_string());
        }

        let value =
            serde_json::to_value(&claims).map_err(|e| OAuthError::signing(e.to_string()))?;
        let token = self
            .jwt
            .generate(&value)
            .map_err(|e| OAuthError::signing(e.to_string()))?;

        tracing::debug!(client_id = %request.client.id, "Issued ID token");
        Ok(token)
    }
}
