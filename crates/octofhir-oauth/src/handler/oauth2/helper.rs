//! Access token issuance shared by the grant handlers.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::OAuthResult;
use crate::storage::Storage;
use crate::token::CoreStrategy;
use crate::types::{AccessRequest, AccessResponse, Request, TokenKind};

/// Issues an access token, persists its session and fills the response.
#[derive(Clone)]
pub struct HandleHelper {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<dyn Storage>,
    access_token_lifespan: Duration,
    redacted_parameters: Vec<String>,
}

impl HandleHelper {
    /// Creates a helper.
    #[must_use]
    pub fn new(
        strategy: Arc<dyn CoreStrategy>,
        storage: Arc<dyn Storage>,
        access_token_lifespan: Duration,
    ) -> Self {
        Self {
            strategy,
            storage,
            access_token_lifespan,
            redacted_parameters: Vec::new(),
        }
    }

    /// Form parameters removed from the request before it is persisted.
    #[must_use]
    pub fn with_redacted_parameters(mut self, parameters: Vec<String>) -> Self {
        self.redacted_parameters = parameters;
        self
    }

    /// Default access token lifespan.
    #[must_use]
    pub fn access_token_lifespan(&self) -> Duration {
        self.access_token_lifespan
    }

    /// Returns a copy of the request with redacted parameters removed.
    #[must_use]
    pub fn sanitize(&self, request: &Request) -> Request {
        request.sanitize(&self.redacted_parameters)
    }

    /// Generates an access token for the request and writes it to the response.
    ///
    /// # Errors
    ///
    /// Strategy and storage errors are returned unchanged; the response is
    /// left untouched in that case.
    pub async fn issue_access_token(
        &self,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        let (token, signature) = self.strategy.generate_access_token(&request.request)?;
        self.storage
            .create_access_token_session(&signature, &self.sanitize(&request.request))
            .await?;

        tracing::debug!(
            request_id = %request.request.id,
            client_id = %request.request.client.id,
            "Issued access token"
        );

        response.set_access_token(token);
        response.set_token_type("bearer");
        response.set_expires_in(get_expires_in(
            &request.request,
            TokenKind::AccessToken,
            self.access_token_lifespan,
            OffsetDateTime::now_utc(),
        ));
        response.set_scopes(request.request.granted_scopes.clone());
        Ok(())
    }
}

impl std::fmt::Debug for HandleHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleHelper")
            .field("access_token_lifespan", &self.access_token_lifespan)
            .field("redacted_parameters", &self.redacted_parameters)
            .finish_non_exhaustive()
    }
}

/// Remaining lifetime of a token kind.
///
/// Returns `default_lifespan` when the session carries no expiry for `kind`,
/// otherwise `expires_at - now`, which is negative once the instant passed.
#[must_use]
pub fn get_expires_in(
    request: &Request,
    kind: TokenKind,
    default_lifespan: Duration,
    now: OffsetDateTime,
) -> Duration {
    match request.session.expires_at(kind) {
        Some(expires_at) => expires_at - now,
        None => default_lifespan,
    }
}
