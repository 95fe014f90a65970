//! Client credentials grant (RFC 6749 section 4.4).

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::helper::HandleHelper;
use crate::handler::{Handler, HandlerKind, TokenEndpointHandler};
use crate::strategy::{AudienceMatchingStrategy, ScopeStrategy};
use crate::types::{AccessRequest, AccessResponse, TokenKind};
use crate::{OAuthError, OAuthResult};

const GRANT_TYPE: &str = "client_credentials";

/// Issues access tokens to confidential clients acting on their own behalf.
#[derive(Clone)]
pub struct ClientCredentialsGrantHandler {
    helper: HandleHelper,
    scope_strategy: Arc<dyn ScopeStrategy>,
    audience_strategy: Arc<dyn AudienceMatchingStrategy>,
}

impl ClientCredentialsGrantHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(
        helper: HandleHelper,
        scope_strategy: Arc<dyn ScopeStrategy>,
        audience_strategy: Arc<dyn AudienceMatchingStrategy>,
    ) -> Self {
        Self {
            helper,
            scope_strategy,
            audience_strategy,
        }
    }
}

impl Handler for ClientCredentialsGrantHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::CLIENT_CREDENTIALS
    }
}

#[async_trait]
impl TokenEndpointHandler for ClientCredentialsGrantHandler {
    fn can_handle_token_endpoint_request(&self, request: &AccessRequest) -> bool {
        request.grant_types.exact_one(GRANT_TYPE)
    }

    async fn handle_token_endpoint_request(
        &self,
        request: &mut AccessRequest,
    ) -> OAuthResult<()> {
        if !self.can_handle_token_endpoint_request(request) {
            return Err(OAuthError::unknown_request());
        }

        let client = &request.request.client;
        for scope in &request.request.requested_scopes {
            if !self.scope_strategy.matches(client.scopes.as_slice(), scope) {
                return Err(OAuthError::invalid_scope().with_hint(format!(
                    "The OAuth 2.0 Client is not allowed to request scope '{scope}'."
                )));
            }
        }

        self.audience_strategy.check(
            client.audience.as_slice(),
            request.request.requested_audience.as_slice(),
        )?;

        // The client already authenticated at the token endpoint; only
        // confidential clients may act on their own behalf.
        if client.is_public() {
            return Err(OAuthError::invalid_grant().with_hint(
                "The OAuth 2.0 Client is marked as public and is thus not allowed to use authorization grant 'client_credentials'.",
            ));
        }

        let inner = &mut request.request;
        let scopes: Vec<String> = inner.requested_scopes.iter().cloned().collect();
        for scope in scopes {
            inner.grant_scope(scope);
        }
        let audience: Vec<String> = inner.requested_audience.iter().cloned().collect();
        for aud in audience {
            inner.grant_audience(aud);
        }

        inner.session.set_expires_at(
            TokenKind::AccessToken,
            OffsetDateTime::now_utc() + self.helper.access_token_lifespan(),
        );
        request.handled_grant_types.append(GRANT_TYPE);
        Ok(())
    }

    async fn populate_token_endpoint_response(
        &self,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        if !self.can_handle_token_endpoint_request(request) {
            return Err(OAuthError::unknown_request());
        }

        if !request.request.client.grant_types.has(GRANT_TYPE) {
            return Err(OAuthError::unauthorized_client().with_hint(
                "The OAuth 2.0 Client is not allowed to use authorization grant 'client_credentials'.",
            ));
        }

        self.helper.issue_access_token(request, response).await
    }
}
