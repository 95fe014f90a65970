//! OpenID Connect implicit flow, `response_type=id_token`.

use async_trait::async_trait;

use super::helper::IdTokenHandleHelper;
use crate::handler::{AuthorizeEndpointHandler, Handler, HandlerKind, registered_redirect_uri};
use crate::types::{AuthorizeRequest, AuthorizeResponse, ResponseMode};
use crate::{OAuthError, OAuthResult};

const RESPONSE_TYPE: &str = "id_token";

/// Returns an ID token directly from the authorization endpoint.
#[derive(Debug, Clone)]
pub struct OpenIdConnectImplicitHandler {
    helper: IdTokenHandleHelper,
    min_parameter_entropy: usize,
}

impl OpenIdConnectImplicitHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(helper: IdTokenHandleHelper, min_parameter_entropy: usize) -> Self {
        Self {
            helper,
            min_parameter_entropy,
        }
    }
}

impl Handler for OpenIdConnectImplicitHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::OPENID_IMPLICIT
    }
}

#[async_trait]
impl AuthorizeEndpointHandler for OpenIdConnectImplicitHandler {
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

        let inner = &request.request;
        if !inner.granted_scopes.has("openid") {
            return Err(OAuthError::invalid_scope()
                .with_hint("The 'openid' scope must be granted to receive an ID token."));
        }
        if !inner.client.response_types.has(RESPONSE_TYPE) {
            return Err(OAuthError::invalid_grant()
                .with_hint("The OAuth 2.0 Client is not allowed to use response type 'id_token'."));
        }
        registered_redirect_uri(request)?;

        match inner.form.get("nonce") {
            None => {
                return Err(OAuthError::invalid_request().with_hint(
                    "Parameter 'nonce' must be set when using the OpenID Connect Implicit Flow.",
                ));
            }
            Some(nonce) if nonce.len() < self.min_parameter_entropy => {
                return Err(OAuthError::invalid_request().with_hint(format!(
                    "Parameter 'nonce' is set but does not satisfy the minimum entropy of {} characters.",
                    self.min_parameter_entropy
                )));
            }
            Some(_) => {}
        }

        request.default_response_mode = ResponseMode::Fragment;
        self.helper.issue_implicit_id_token(&request.request, response)?;
        if let Some(state) = &request.state {
            response.add_parameter("state", state.clone());
        }
        request.set_response_type_handled(RESPONSE_TYPE);
        Ok(())
    }
}
