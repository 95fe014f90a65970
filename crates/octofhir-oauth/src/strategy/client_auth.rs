//! Client authentication for the token, introspection and revocation endpoints.
//!
//! # Authentication Methods
//!
//! - `none` - Public clients (client_id only)
//! - `client_secret_basic` - HTTP Basic Auth with client_id:client_secret
//! - `client_secret_post` - client_id and client_secret in the form body
//! - `private_key_jwt` - Client assertion JWT (RFC 7523)
//!
//! # Authentication Priority
//!
//! 1. Client assertion (`client_assertion_type` present)
//! 2. HTTP Basic Auth header
//! 3. Form body credentials
//!
//! The method actually used must match the client's registered
//! `token_endpoint_auth_method`.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use time::OffsetDateTime;

use super::hasher::Hasher;
use super::jwks::JwksFetcherStrategy;
use crate::storage::Storage;
use crate::types::{Client, HttpRequest, TokenEndpointAuthMethod};
use crate::{OAuthError, OAuthResult};

/// The only supported `client_assertion_type`.
pub const JWT_BEARER_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Authenticates the client behind a transport request.
#[async_trait]
pub trait ClientAuthenticationStrategy: Send + Sync {
    /// Returns the authenticated client.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` when the credentials do not authenticate a
    /// registered client, and `invalid_request` when they are malformed.
    async fn authenticate_client(&self, request: &HttpRequest) -> OAuthResult<Client>;
}

#[derive(Debug, Deserialize)]
struct AssertionClaims {
    exp: i64,
    #[serde(default)]
    jti: Option<String>,
}

/// Default client authentication over the storage, hasher and JWKS fetcher.
#[derive(Clone)]
pub struct DefaultClientAuthenticationStrategy {
    storage: Arc<dyn Storage>,
    hasher: Arc<dyn Hasher>,
    jwks_fetcher: Arc<dyn JwksFetcherStrategy>,
    token_url: String,
}

impl std::fmt::Debug for DefaultClientAuthenticationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultClientAuthenticationStrategy")
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl DefaultClientAuthenticationStrategy {
    /// Creates the strategy.
    ///
    /// `token_url` is the audience every client assertion must carry.
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        hasher: Arc<dyn Hasher>,
        jwks_fetcher: Arc<dyn JwksFetcherStrategy>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            hasher,
            jwks_fetcher,
            token_url: token_url.into(),
        }
    }

    async fn load_client(&self, client_id: &str) -> OAuthResult<Client> {
        self.storage.get_client(client_id).await?.ok_or_else(|| {
            OAuthError::invalid_client()
                .with_hint("The requested OAuth 2.0 Client does not exist.")
        })
    }

    async fn authenticate_with_secret(
        &self,
        client_id: &str,
        client_secret: &str,
        method: TokenEndpointAuthMethod,
    ) -> OAuthResult<Client> {
        let client = self.load_client(client_id).await?;

        if client.is_public() {
            if !client_secret.is_empty() {
                return Err(OAuthError::invalid_client()
                    .with_hint("Public clients must not present a client secret."));
            }
            return Ok(client);
        }

        ensure_method(&client, method)?;

        let Some(hashed_secret) = client.hashed_secret.as_deref() else {
            return Err(OAuthError::invalid_client()
                .with_hint("The OAuth 2.0 Client has no secret registered."));
        };
        if !self.hasher.compare(hashed_secret, client_secret.as_bytes())? {
            tracing::debug!(client_id, "Client secret mismatch");
            return Err(OAuthError::invalid_client()
                .with_hint("The provided client secret did not match."));
        }

        Ok(client)
    }

    async fn authenticate_with_assertion(
        &self,
        assertion: &str,
        form_client_id: Option<&str>,
    ) -> OAuthResult<Client> {
        let client_id = extract_subject_unverified(assertion)?;
        if let Some(form_client_id) = form_client_id
            && form_client_id != client_id
        {
            return Err(OAuthError::invalid_client().with_hint(
                "Parameter 'client_id' does not match the subject of 'client_assertion'.",
            ));
        }

        let client = self.load_client(&client_id).await?;
        ensure_method(&client, TokenEndpointAuthMethod::PrivateKeyJwt)?;

        let header = jsonwebtoken::decode_header(assertion).map_err(|e| {
            OAuthError::invalid_client()
                .with_hint("Unable to decode the 'client_assertion' header.")
                .with_debug(e.to_string())
        })?;
        if matches!(
            header.alg,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(OAuthError::invalid_client().with_hint(format!(
                "The 'client_assertion' uses unsupported algorithm '{:?}'.",
                header.alg
            )));
        }

        let jwk = self.find_key(&client, header.kid.as_deref()).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            OAuthError::invalid_client()
                .with_hint("Unable to use the client's JSON Web Key.")
                .with_debug(e.to_string())
        })?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.token_url]);
        validation.set_issuer(&[&client.id]);
        validation.sub = Some(client.id.clone());
        validation.set_required_spec_claims(&["exp", "iss", "sub", "aud"]);

        let claims = jsonwebtoken::decode::<AssertionClaims>(assertion, &key, &validation)
            .map_err(|e| {
                tracing::debug!(client_id = %client.id, error = %e, "Client assertion rejected");
                OAuthError::invalid_client()
                    .with_hint("Unable to verify the integrity of the 'client_assertion' value.")
                    .with_debug(e.to_string())
            })?
            .claims;

        let Some(jti) = claims.jti.filter(|j| !j.is_empty()) else {
            return Err(OAuthError::invalid_client()
                .with_hint("Claim 'jti' from 'client_assertion' must be set but is not."));
        };
        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp).map_err(|e| {
            OAuthError::invalid_client()
                .with_hint("Claim 'exp' from 'client_assertion' is out of range.")
                .with_debug(e.to_string())
        })?;

        self.storage.client_assertion_jwt_valid(&jti).await?;
        self.storage.set_client_assertion_jwt(&jti, expires_at).await?;

        Ok(client)
    }

    async fn find_key(&self, client: &Client, kid: Option<&str>) -> OAuthResult<Jwk> {
        if let Some(jwks) = &client.jwks {
            return select_key(jwks, kid).cloned().ok_or_else(key_not_found);
        }

        let Some(location) = client.jwks_uri.as_deref() else {
            return Err(OAuthError::invalid_client().with_hint(
                "The OAuth 2.0 Client has no JSON Web Keys set registered.",
            ));
        };

        let jwks = self.jwks_fetcher.resolve(location, false).await?;
        if let Some(key) = select_key(&jwks, kid) {
            return Ok(key.clone());
        }

        tracing::debug!(client_id = %client.id, ?kid, "Key not cached, refreshing JWKS");
        let jwks = self.jwks_fetcher.resolve(location, true).await?;
        select_key(&jwks, kid).cloned().ok_or_else(key_not_found)
    }
}

#[async_trait]
impl ClientAuthenticationStrategy for DefaultClientAuthenticationStrategy {
    async fn authenticate_client(&self, request: &HttpRequest) -> OAuthResult<Client> {
        let form = &request.form;

        if let Some(assertion_type) = form.get("client_assertion_type") {
            if assertion_type != JWT_BEARER_ASSERTION_TYPE {
                return Err(OAuthError::invalid_request().with_hint(format!(
                    "Unknown client_assertion_type '{assertion_type}'."
                )));
            }
            let Some(assertion) = form.get("client_assertion").filter(|a| !a.is_empty()) else {
                return Err(OAuthError::invalid_request().with_hint(
                    "Parameter 'client_assertion' must be set when using 'private_key_jwt'.",
                ));
            };
            return self
                .authenticate_with_assertion(assertion, form.get("client_id"))
                .await;
        }

        if let Some((client_id, client_secret)) = request.basic_auth() {
            return self
                .authenticate_with_secret(
                    &client_id,
                    &client_secret,
                    TokenEndpointAuthMethod::ClientSecretBasic,
                )
                .await;
        }

        let Some(client_id) = form.get("client_id").filter(|id| !id.is_empty()) else {
            return Err(OAuthError::invalid_request()
                .with_hint("Client credentials missing or malformed."));
        };
        let client_secret = form.get("client_secret").unwrap_or_default();
        self.authenticate_with_secret(
            client_id,
            client_secret,
            TokenEndpointAuthMethod::ClientSecretPost,
        )
        .await
    }
}

fn ensure_method(client: &Client, used: TokenEndpointAuthMethod) -> OAuthResult<()> {
    if client.token_endpoint_auth_method == used {
        return Ok(());
    }
    Err(OAuthError::invalid_client().with_hint(format!(
        "The OAuth 2.0 Client supports client authentication method '{}', but method '{}' was requested.",
        client.token_endpoint_auth_method, used
    )))
}

fn select_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => jwks.find(kid),
        None if jwks.keys.len() == 1 => jwks.keys.first(),
        None => None,
    }
}

fn key_not_found() -> OAuthError {
    OAuthError::invalid_client()
        .with_hint("No JSON Web Key matches the 'client_assertion' header.")
}

/// Reads the `sub` claim of a JWT without verifying it.
///
/// Only used to pick the client whose keys then verify the assertion.
fn extract_subject_unverified(assertion: &str) -> OAuthResult<String> {
    #[derive(Deserialize)]
    struct Subject {
        #[serde(default)]
        sub: Option<String>,
    }

    let malformed = || {
        OAuthError::invalid_client().with_hint("Unable to decode 'client_assertion'.")
    };

    let mut parts = assertion.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|_| malformed())?;
    let subject: Subject = serde_json::from_slice(&bytes).map_err(|_| malformed())?;
    subject.sub.filter(|s| !s.is_empty()).ok_or_else(|| {
        OAuthError::invalid_client()
            .with_hint("Claim 'sub' from 'client_assertion' must be set but is not.")
    })
}
