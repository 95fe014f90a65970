//! Refresh token grant (RFC 6749 section 6).
//!
//! Every successful refresh rotates the token pair: the access and refresh
//! tokens previously issued for the grant are revoked and a new pair is
//! issued under the same request id. A revoked refresh token presented again
//! is rejected.
//!
//! With an [`IdTokenHandleHelper`] attached, grants that hold the `openid`
//! scope also receive a fresh ID token.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::helper::HandleHelper;
use crate::handler::openid::{IdTokenHandleHelper, access_token_hash};
use crate::handler::{Handler, HandlerKind, TokenEndpointHandler};
use crate::storage::Storage;
use crate::strategy::{AudienceMatchingStrategy, ScopeStrategy};
use crate::token::CoreStrategy;
use crate::types::{AccessRequest, AccessResponse, Request, TokenKind};
use crate::{ErrorKind, OAuthError, OAuthResult};

const GRANT_TYPE: &str = "refresh_token";

/// Exchanges a refresh token for a new token pair.
#[derive(Clone)]
pub struct RefreshTokenGrantHandler {
    helper: HandleHelper,
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<dyn Storage>,
    scope_strategy: Arc<dyn ScopeStrategy>,
    audience_strategy: Arc<dyn AudienceMatchingStrategy>,
    refresh_token_scopes: Vec<String>,
    id_token: Option<IdTokenHandleHelper>,
}

impl RefreshTokenGrantHandler {
    /// Creates the handler.
    ///
    /// `refresh_token_scopes` lists the scopes of which the original grant
    /// must hold at least one. An empty list allows every grant to refresh.
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

    /// Issues ID tokens on refresh for grants holding `openid`.
    #[must_use]
    pub fn with_id_token_helper(mut self, helper: IdTokenHandleHelper) -> Self {
        self.id_token = Some(helper);
        self
    }

    async fn load_original(&self, token: &str) -> OAuthResult<Request> {
        let signature = self.strategy.refresh_token_signature(token);
        match self.storage.get_refresh_token_session(&signature).await {
            Ok(Some(original)) => Ok(original),
            Ok(None) => {
                Err(OAuthError::invalid_grant().with_hint("The refresh token has not been found."))
            }
            Err(e) if e.is(ErrorKind::InactiveToken) => {
                tracing::warn!("Inactive refresh token presented");
                Err(OAuthError::invalid_grant()
                    .with_hint("The refresh token was already used or has been revoked.")
                    .with_debug(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

impl Handler for RefreshTokenGrantHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::REFRESH_TOKEN
    }
}

#[async_trait]
impl TokenEndpointHandler for RefreshTokenGrantHandler {
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

        let client = request.request.client.clone();
        if !client.grant_types.has(GRANT_TYPE) {
            return Err(OAuthError::unauthorized_client().with_hint(
                "The OAuth 2.0 Client is not allowed to use authorization grant 'refresh_token'.",
            ));
        }

        let token = request
            .request
            .form
            .get("refresh_token")
            .ok_or_else(|| {
                OAuthError::invalid_request().with_hint("The 'refresh_token' parameter is missing.")
            })?
            .to_string();

        let original = self.load_original(&token).await?;

        self.strategy
            .validate_refresh_token(&original, &token)
            .map_err(|e| {
                let hint = e.hint().unwrap_or("The refresh token is invalid.").to_string();
                OAuthError::invalid_grant()
                    .with_hint(hint)
                    .with_debug(e.to_string())
            })?;

        if original.client.id != client.id {
            return Err(OAuthError::invalid_grant().with_hint(
                "The OAuth 2.0 Client ID from this request does not match the ID during the initial token issuance.",
            ));
        }

        let refresh_scopes: Vec<&str> =
            self.refresh_token_scopes.iter().map(String::as_str).collect();
        if !refresh_scopes.is_empty() && !original.granted_scopes.has_one_of(&refresh_scopes) {
            return Err(OAuthError::invalid_scope().with_hint(format!(
                "The OAuth 2.0 Client was not granted scope {} and may thus not perform the 'refresh_token' authorization grant.",
                refresh_scopes.join(" or ")
            )));
        }

        let requested: Vec<String> = if request.request.requested_scopes.is_empty() {
            original.granted_scopes.iter().cloned().collect()
        } else {
            request.request.requested_scopes.iter().cloned().collect()
        };
        for scope in &requested {
            if !original.granted_scopes.has(scope) {
                return Err(OAuthError::invalid_scope().with_hint(format!(
                    "The requested scope '{scope}' was not originally granted by the resource owner."
                )));
            }
            if !self.scope_strategy.matches(client.scopes.as_slice(), scope) {
                return Err(OAuthError::invalid_scope().with_hint(format!(
                    "The OAuth 2.0 Client is not allowed to request scope '{scope}'."
                )));
            }
        }

        self.audience_strategy.check(
            client.audience.as_slice(),
            original.granted_audience.as_slice(),
        )?;

        let inner = &mut request.request;
        inner.id = original.id;
        inner.session = original.session;
        inner.requested_audience = original.requested_audience;
        for scope in requested {
            inner.grant_scope(scope);
        }
        for audience in original.granted_audience.iter() {
            inner.grant_audience(audience.clone());
        }

        let now = OffsetDateTime::now_utc();
        inner.session.set_expires_at(
            TokenKind::AccessToken,
            now + self.strategy.lifespan(TokenKind::AccessToken),
        );
        inner.session.set_expires_at(
            TokenKind::RefreshToken,
            now + self.strategy.lifespan(TokenKind::RefreshToken),
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

        let request_id = &request.request.id;
        self.storage.revoke_access_token(request_id).await?;
        self.storage.revoke_refresh_token(request_id).await?;
        tracing::debug!(request_id = %request_id, "Rotated refresh token");

        let (refresh_token, refresh_signature) =
            self.strategy.generate_refresh_token(&request.request)?;
        self.helper.issue_access_token(request, response).await?;
        self.storage
            .create_refresh_token_session(
                &refresh_signature,
                &self.helper.sanitize(&request.request),
            )
            .await?;
        response.set_extra("refresh_token", refresh_token);

        if let Some(id_token) = &self.id_token
            && request.request.granted_scopes.has("openid")
        {
            let mut id_request = request.request.clone();
            id_request
                .session
                .set_access_token_hash(access_token_hash(response.access_token()));
            if let Some(claims) = id_request.session.id_token_claims.as_mut() {
                claims.nonce = None;
            }
            id_token.issue_explicit_id_token(&id_request, response)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, RefreshTokenStorage};
    use crate::strategy::{DefaultAudienceMatchingStrategy, ExactScopeStrategy};
    use crate::token::{HmacShaStrategy, HmacStrategy, Lifespans};
    use crate::token::strategy::RefreshTokenStrategy;
    use crate::types::Client;

    struct Setup {
        store: Arc<MemoryStore>,
        strategy: Arc<HmacShaStrategy>,
        handler: RefreshTokenGrantHandler,
    }

    fn setup(refresh_scopes: &[&str]) -> Setup {
        let store = Arc::new(MemoryStore::new());
        let strategy = Arc::new(HmacShaStrategy::new(
            HmacStrategy::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap(),
            Lifespans::default(),
        ));
        let helper = HandleHelper::new(strategy.clone(), store.clone(), time::Duration::hours(1));
        let handler = RefreshTokenGrantHandler::new(
            helper,
            strategy.clone(),
            store.clone(),
            Arc::new(ExactScopeStrategy),
            Arc::new(DefaultAudienceMatchingStrategy),
            refresh_scopes.iter().map(|s| s.to_string()).collect(),
        );
        Setup {
            store,
            strategy,
            handler,
        }
    }

    fn client(id: &str) -> Client {
        Client::confidential(id, "$argon2id$stub")
            .with_grant_types(["authorization_code", "refresh_token"])
            .with_scopes(["offline", "read", "write"])
    }

    async fn seed(setup: &Setup, client: Client, granted: &[&str]) -> (String, Request) {
        let mut original = Request::new(client);
        for scope in granted {
            original.grant_scope(*scope);
        }
        let (token, signature) = setup.strategy.generate_refresh_token(&original).unwrap();
        setup
            .store
            .create_refresh_token_session(&signature, &original)
            .await
            .unwrap();
        (token, original)
    }

    fn refresh_request(client: Client, token: &str) -> AccessRequest {
        let mut request = Request::new(client);
        request.form.set("refresh_token", token);
        AccessRequest::new(request).with_grant_types(["refresh_token"])
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let setup = setup(&["offline"]);
        let (token, original) = seed(&setup, client("app"), &["offline", "read"]).await;

        let mut request = refresh_request(client("app"), &token);
        setup
            .handler
            .handle_token_endpoint_request(&mut request)
            .await
            .unwrap();
        assert_eq!(request.request.id, original.id);
        assert!(request.request.granted_scopes.has_all(&["offline", "read"]));

        let mut response = AccessResponse::new();
        setup
            .handler
            .populate_token_endpoint_response(&request, &mut response)
            .await
            .unwrap();

        let new_refresh = response.extra("refresh_token").unwrap().as_str().unwrap();
        assert_ne!(new_refresh, token);
        assert!(!response.access_token().is_empty());

        // the presented token is now revoked
        let mut replay = refresh_request(client("app"), &token);
        let err = setup
            .handler
            .handle_token_endpoint_request(&mut replay)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);

        // the new one works
        let mut next = refresh_request(client("app"), new_refresh);
        assert!(
            setup
                .handler
                .handle_token_endpoint_request(&mut next)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let setup = setup(&[]);
        let (token, _) = setup.strategy.generate_refresh_token(&Request::default()).unwrap();
        let mut request = refresh_request(client("app"), &token);
        let err = setup
            .handler
            .handle_token_endpoint_request(&mut request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
        assert!(err.hint().unwrap().contains("not been found"));
    }

    #[tokio::test]
    async fn test_client_mismatch() {
        let setup = setup(&[]);
        let (token, _) = seed(&setup, client("app"), &["read"]).await;
        let mut request = refresh_request(client("other"), &token);
        let err = setup
            .handler
            .handle_token_endpoint_request(&mut request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
    }

    #[tokio::test]
    async fn test_offline_scope_required() {
        let setup = setup(&["offline", "offline_access"]);
        let (token, _) = seed(&setup, client("app"), &["read"]).await;
        let mut request = refresh_request(client("app"), &token);
        let err = setup
            .handler
            .handle_token_endpoint_request(&mut request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidScope);
        assert!(err.hint().unwrap().contains("offline or offline_access"));
    }

    #[tokio::test]
    async fn test_scope_cannot_widen() {
        let setup = setup(&[]);
        let (token, _) = seed(&setup, client("app"), &["read"]).await;
        let mut request = refresh_request(client("app"), &token);
        request.request.requested_scopes.append("write");
        let err = setup
            .handler
            .handle_token_endpoint_request(&mut request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidScope);
        assert!(err.hint().unwrap().contains("'write'"));
    }

    #[tokio::test]
    async fn test_scope_can_narrow() {
        let setup = setup(&[]);
        let (token, _) = seed(&setup, client("app"), &["read", "write"]).await;
        let mut request = refresh_request(client("app"), &token);
        request.request.requested_scopes.append("read");
        setup
            .handler
            .handle_token_endpoint_request(&mut request)
            .await
            .unwrap();
        assert!(request.request.granted_scopes.matches_exact(&["read"]));
    }

    #[tokio::test]
    async fn test_client_without_grant_type() {
        let setup = setup(&[]);
        let (token, _) = seed(&setup, client("app"), &["read"]).await;
        let limited = Client::confidential("app", "$argon2id$stub")
            .with_grant_types(["authorization_code"])
            .with_scopes(["read"]);
        let mut request = refresh_request(limited, &token);
        let err = setup
            .handler
            .handle_token_endpoint_request(&mut request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnauthorizedClient);
    }

    #[tokio::test]
    async fn test_missing_parameter() {
        let setup = setup(&[]);
        let mut request =
            AccessRequest::new(Request::new(client("app"))).with_grant_types(["refresh_token"]);
        let err = setup
            .handler
            .handle_token_endpoint_request(&mut request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
