//! ID token issuance helpers.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::OAuthResult;
use crate::token::OpenIdConnectTokenStrategy;
use crate::types::{AccessResponse, AuthorizeResponse, Request};

/// Computes the `at_hash` claim for an access token.
///
/// SHA-256 of the token bytes, left half, base64url without padding.
#[must_use]
pub fn access_token_hash(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

/// Issues ID tokens into authorize and token responses.
#[derive(Clone)]
pub struct IdTokenHandleHelper {
    strategy: Arc<dyn OpenIdConnectTokenStrategy>,
}

impl IdTokenHandleHelper {
    /// Creates a helper over an ID token strategy.
    #[must_use]
    pub fn new(strategy: Arc<dyn OpenIdConnectTokenStrategy>) -> Self {
        Self { strategy }
    }

    /// The `at_hash` value for the access token already in `response`.
    #[must_use]
    pub fn get_access_token_hash(&self, response: &AccessResponse) -> String {
        access_token_hash(response.access_token())
    }

    /// Adds an `id_token` parameter to an authorize response.
    ///
    /// # Errors
    ///
    /// Strategy errors are returned and the response is left unchanged.
    pub fn issue_implicit_id_token(
        &self,
        request: &Request,
        response: &mut AuthorizeResponse,
    ) -> OAuthResult<()> {
        let token = self.strategy.generate_id_token(request)?;
        response.add_parameter("id_token", token);
        Ok(())
    }

    /// Adds an `id_token` extra to a token response.
    ///
    /// # Errors
    ///
    /// Strategy errors are returned and the response is left unchanged.
    pub fn issue_explicit_id_token(
        &self,
        request: &Request,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        let token = self.strategy.generate_id_token(request)?;
        response.set_extra("id_token", token);
        Ok(())
    }
}

impl std::fmt::Debug for IdTokenHandleHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenHandleHelper").finish_non_exhaustive()
    }
}
