//! Authorization code grant (RFC 6749 section 4.1).
//!
//! One handler serves both endpoints. At the authorization endpoint it
//! issues a code for `response_type=code`; at the token endpoint it
//! exchanges that code once for an access token, plus a refresh token when
//! an offline scope was granted.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::helper::HandleHelper;
use crate::handler::openid::{IdTokenHandleHelper, access_token_hash};
use crate::handler::{
    AuthorizeEndpointHandler, Handler, HandlerKind, TokenEndpointHandler, registered_redirect_uri,
};
use crate::storage::Storage;
use crate::strategy::{AudienceMatchingStrategy, ScopeStrategy};
use crate::token::CoreStrategy;
use crate::types::{
    AccessRequest, AccessResponse, AuthorizeRequest, AuthorizeResponse, Request, TokenKind,
};
use crate::{OAuthError, OAuthResult};

const RESPONSE_TYPE: &str = "code";
const GRANT_TYPE: &str = "authorization_code";

/// Issues and exchanges authorization codes.
#[derive(Clone)]
pub struct AuthorizeExplicitGrantHandler {
    helper: HandleHelper,
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<dyn Storage>,
    scope_strategy: Arc<dyn ScopeStrategy>,
    audience_strategy: Arc<dyn AudienceMatchingStrategy>,
    refresh_token_scopes: Vec<String>,
    id_token: Option<IdTokenHandleHelper>,
}

impl AuthorizeExplicitGrantHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(
        helper: HandleHelper,
        strategy: Arc<dyn CoreStrategy>,
        storage: Arc<dyn Storage>,
        scope_strategy: Arc<dyn ScopeStrategy>,
        audience_strategy: Arc<dyn AudienceMatchingStrategy>,
        refresh_token_scopes: Vec<String>,
    ) -> Self {
        Self {
            helper,
            strategy,
            storage,
            scope_strategy,
            audience_strategy,
            refresh_token_scopes,
            id_token: None,
        }
    }

    /// Issues ID tokens on exchange for grants holding `openid`.
    #[must_use]
    pub fn with_id_token_helper(mut self, helper: IdTokenHandleHelper) -> Self {
        self.id_token = Some(helper);
        self
    }

    fn can_issue_refresh_token(&self, request: &Request) -> bool {
        let scopes: Vec<&str> = self.refresh_token_scopes.iter().map(String::as_str).collect();
        (scopes.is_empty() || request.granted_scopes.has_one_of(&scopes))
            && request.client.grant_types.has("refresh_token")
    }

    async fn load_code(&self, code: &str) -> OAuthResult<Request> {
        let signature = self.strategy.authorize_code_signature(code);
        self.storage
            .get_authorize_code_session(&signature)
            .await?
            .ok_or_else(|| {
                OAuthError::invalid_grant().with_hint("The authorization code has not been found.")
            })
    }
}

impl Handler for AuthorizeExplicitGrantHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::AUTHORIZE_CODE
    }
}

// ============================================================================
// Authorization Endpoint
// ============================================================================

#[async_trait]
impl AuthorizeEndpointHandler for AuthorizeExplicitGrantHandler {
    fn can_handle_authorize_endpoint_request(&self, request: &AuthorizeRequest) -> bool {
        request.response_types.exact_one(RESPONSE_TYPE)
    }

    async fn handle_authorize_endpoint_request(
        &self,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> OAuthResult<()> {
        if !self.can_handle_authorize_endpoint_request(request) {
            return Err(OAuthError::unknown_request());
        }

        let client = &request.request.client;
        if !client.response_types.has(RESPONSE_TYPE) {
            return Err(OAuthError::unsupported_response_type().with_hint(
                "The client is not allowed to request response_type 'code'.",
            ));
        }

        registered_redirect_uri(request)?;

        for scope in &request.request.requested_scopes {
            if !self.scope_strategy.matches(client.scopes.as_slice(), scope) {
                return Err(OAuthError::invalid_scope().with_hint(format!(
                    "The OAuth 2.0 Client is not allowed to request scope '{scope}'."
                )));
            }
        }
        if let Some(scope) = request
            .request
            .granted_scopes
            .iter()
            .find(|s| !request.request.requested_scopes.has(s))
        {
            return Err(OAuthError::invalid_scope().with_hint(format!(
                "The scope '{scope}' was granted but never requested."
            )));
        }

        self.audience_strategy.check(
            client.audience.as_slice(),
            request.request.requested_audience.as_slice(),
        )?;

        let inner = &mut request.request;
        inner.session.set_expires_at(
            TokenKind::AuthorizeCode,
            OffsetDateTime::now_utc() + self.strategy.lifespan(TokenKind::AuthorizeCode),
        );
        if let Some(nonce) = inner.form.get("nonce").map(str::to_string)
            && let Some(claims) = inner.session.id_token_claims.as_mut()
        {
            claims.nonce = Some(nonce);
        }

        let (code, signature) = self.strategy.generate_authorize_code(inner)?;
        self.storage
            .create_authorize_code_session(&signature, &self.helper.sanitize(inner))
            .await?;

        tracing::debug!(
            request_id = %inner.id,
            client_id = %inner.client.id,
            "Issued authorization code"
        );

        response.add_parameter("code", code);
        if let Some(state) = &request.state {
            response.add_parameter("state", state.clone());
        }
        if !request.request.granted_scopes.is_empty() {
            response.add_parameter("scope", request.request.granted_scopes.to_space_delimited());
        }
        request.set_response_type_handled(RESPONSE_TYPE);
        Ok(())
    }
}

// ============================================================================
// Token Endpoint
// ============================================================================

#[async_trait]
impl TokenEndpointHandler for AuthorizeExplicitGrantHandler {
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

        if !request.request.client.grant_types.has(GRANT_TYPE) {
            return Err(OAuthError::unauthorized_client().with_hint(
                "The OAuth 2.0 Client is not allowed to use authorization grant 'authorization_code'.",
            ));
        }

        let code = request
            .request
            .form
            .get("code")
            .ok_or_else(|| {
                OAuthError::invalid_request().with_hint("The 'code' parameter is missing.")
            })?
            .to_string();

        let original = self.load_code(&code).await?;

        self.strategy
            .validate_authorize_code(&original, &code)
            .map_err(|e| {
                let hint = e.hint().unwrap_or("The authorization code is invalid.").to_string();
                OAuthError::invalid_grant()
                    .with_hint(hint)
                    .with_debug(e.to_string())
            })?;

        if original.client.id != request.request.client.id {
            return Err(OAuthError::invalid_grant().with_hint(
                "The OAuth 2.0 Client ID from this request does not match the one from the authorize request.",
            ));
        }

        if let Some(forced) = original.form.get("redirect_uri")
            && request.request.form.get("redirect_uri") != Some(forced)
        {
            return Err(OAuthError::invalid_grant().with_hint(
                "The 'redirect_uri' from this request does not match the one from the authorize request.",
            ));
        }

        let inner = &mut request.request;
        inner.id = original.id;
        inner.session = original.session;
        inner.requested_scopes = original.requested_scopes;
        inner.granted_scopes = original.granted_scopes;
        inner.requested_audience = original.requested_audience;
        inner.granted_audience = original.granted_audience;

        let now = OffsetDateTime::now_utc();
        inner.session.set_expires_at(
            TokenKind::AccessToken,
            now + self.strategy.lifespan(TokenKind::AccessToken),
        );
        if self.can_issue_refresh_token(inner) {
            inner.session.set_expires_at(
                TokenKind::RefreshToken,
                now + self.strategy.lifespan(TokenKind::RefreshToken),
            );
        }

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

        let code = request.request.form.get("code").ok_or_else(|| {
            OAuthError::invalid_request().with_hint("The 'code' parameter is missing.")
        })?;
        let signature = self.strategy.authorize_code_signature(code);
        self.storage
            .invalidate_authorize_code_session(&signature)
            .await?;

        self.helper.issue_access_token(request, response).await?;

        if self.can_issue_refresh_token(&request.request) {
            let (refresh_token, refresh_signature) =
                self.strategy.generate_refresh_token(&request.request)?;
            self.storage
                .create_refresh_token_session(
                    &refresh_signature,
                    &self.helper.sanitize(&request.request),
                )
                .await?;
            response.set_extra("refresh_token", refresh_token);
        }

        if let Some(id_token) = &self.id_token
            && request.request.granted_scopes.has("openid")
        {
            let mut id_request = request.request.clone();
            id_request
                .session
                .set_access_token_hash(access_token_hash(response.access_token()));
            id_token.issue_explicit_id_token(&id_request, response)?;
        }

        Ok(())
    }
}
