//! Token introspection (RFC 7662).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;

use crate::handler::{Handler, HandlerKind, TokenIntrospector, TokenUse};
use crate::storage::Storage;
use crate::strategy::ScopeStrategy;
use crate::token::{CoreStrategy, JwtStrategy};
use crate::types::{AccessRequest, Arguments, Client, Request, TokenKind};
use crate::{OAuthError, OAuthResult};

fn check_scopes(
    strategy: &dyn ScopeStrategy,
    granted: &Arguments,
    scopes: &[String],
) -> OAuthResult<()> {
    match scopes.iter().find(|s| !strategy.matches(granted.as_slice(), s)) {
        Some(scope) => Err(OAuthError::invalid_scope().with_hint(format!(
            "The request scope '{scope}' has not been granted or is not allowed to be requested."
        ))),
        None => Ok(()),
    }
}

// ============================================================================
// Storage-backed validator
// ============================================================================

/// Validates tokens against their stored sessions.
///
/// With a `token_use` hint the hinted kind is tried first. A token unknown
/// to storage as that kind is then tried as the other kind.
#[derive(Clone)]
pub struct CoreValidator {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<dyn Storage>,
    scope_strategy: Arc<dyn ScopeStrategy>,
    disable_refresh_token_validation: bool,
}

impl CoreValidator {
    /// Creates the validator.
    #[must_use]
    pub fn new(
        strategy: Arc<dyn CoreStrategy>,
        storage: Arc<dyn Storage>,
        scope_strategy: Arc<dyn ScopeStrategy>,
    ) -> Self {
        Self {
            strategy,
            storage,
            scope_strategy,
            disable_refresh_token_validation: false,
        }
    }

    /// Only access tokens are introspected when set.
    #[must_use]
    pub fn with_refresh_token_validation_disabled(mut self, disabled: bool) -> Self {
        self.disable_refresh_token_validation = disabled;
        self
    }

    async fn introspect_as(
        &self,
        token_use: TokenUse,
        token: &str,
        request: &mut AccessRequest,
        scopes: &[String],
    ) -> OAuthResult<()> {
        let original = match token_use {
            TokenUse::AccessToken => {
                let signature = self.strategy.access_token_signature(token);
                let original = self
                    .storage
                    .get_access_token_session(&signature)
                    .await?
                    .ok_or_else(OAuthError::unknown_request)?;
                self.strategy.validate_access_token(&original, token)?;
                original
            }
            TokenUse::RefreshToken => {
                let signature = self.strategy.refresh_token_signature(token);
                let original = self
                    .storage
                    .get_refresh_token_session(&signature)
                    .await?
                    .ok_or_else(OAuthError::unknown_request)?;
                self.strategy.validate_refresh_token(&original, token)?;
                original
            }
        };

        check_scopes(self.scope_strategy.as_ref(), &original.granted_scopes, scopes)?;
        request.request = original;
        Ok(())
    }
}

impl Handler for CoreValidator {
    fn kind(&self) -> HandlerKind {
        HandlerKind::CORE_VALIDATOR
    }
}

#[async_trait]
impl TokenIntrospector for CoreValidator {
    async fn introspect_token(
        &self,
        token: &str,
        token_use: TokenUse,
        request: &mut AccessRequest,
        scopes: &[String],
    ) -> OAuthResult<TokenUse> {
        if self.disable_refresh_token_validation {
            self.introspect_as(TokenUse::AccessToken, token, request, scopes)
                .await?;
            return Ok(TokenUse::AccessToken);
        }

        match self.introspect_as(token_use, token, request, scopes).await {
            Ok(()) => return Ok(token_use),
            Err(e) if e.is_unknown_request() => {}
            Err(e) => return Err(e),
        }

        let fallback = token_use.other();
        self.introspect_as(fallback, token, request, scopes).await?;
        Ok(fallback)
    }
}

// ============================================================================
// Stateless JWT validator
// ============================================================================

/// Validates JWT access tokens from their claims alone.
///
/// Storage is never consulted, so revoked tokens stay valid until they
/// expire. Use [`CoreValidator`] where revocation must take effect.
#[derive(Clone)]
pub struct StatelessJwtValidator {
    jwt: Arc<dyn JwtStrategy>,
    scope_strategy: Arc<dyn ScopeStrategy>,
}

impl StatelessJwtValidator {
    /// Creates the validator.
    #[must_use]
    pub fn new(jwt: Arc<dyn JwtStrategy>, scope_strategy: Arc<dyn ScopeStrategy>) -> Self {
        Self {
            jwt,
            scope_strategy,
        }
    }
}

impl Handler for StatelessJwtValidator {
    fn kind(&self) -> HandlerKind {
        HandlerKind::STATELESS_JWT_VALIDATOR
    }
}

#[async_trait]
impl TokenIntrospector for StatelessJwtValidator {
    async fn introspect_token(
        &self,
        token: &str,
        _token_use: TokenUse,
        request: &mut AccessRequest,
        scopes: &[String],
    ) -> OAuthResult<TokenUse> {
        let claims = match self.jwt.validate(token) {
            Ok(claims) => claims,
            Err(e) if e.is_malformed() => return Err(OAuthError::unknown_request()),
            Err(e) => return Err(e.into()),
        };

        let text = |key: &str| {
            claims
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let client_id = text("client_id");
        if client_id.is_empty() {
            return Err(OAuthError::unknown_request());
        }

        let mut original = Request::new(Client {
            id: client_id,
            ..Default::default()
        });
        original.id = text("jti");
        original.granted_scopes = Arguments::from_space_delimited(&text("scope"));
        original.granted_audience = match claims.get("aud") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(aud)) => Arguments::from_space_delimited(aud),
            _ => Arguments::new(),
        };
        original.session.subject = text("sub");
        if let Some(iat) = claims.get("iat").and_then(Value::as_i64)
            && let Ok(at) = OffsetDateTime::from_unix_timestamp(iat)
        {
            original.requested_at = at;
        }
        if let Some(exp) = claims.get("exp").and_then(Value::as_i64)
            && let Ok(at) = OffsetDateTime::from_unix_timestamp(exp)
        {
            original.session.set_expires_at(TokenKind::AccessToken, at);
        }

        check_scopes(self.scope_strategy.as_ref(), &original.granted_scopes, scopes)?;
        request.request = original;
        Ok(TokenUse::AccessToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::storage::{
        AccessTokenStorage, MemoryStore, RefreshTokenStorage, TokenRevocationStorage,
    };
    use crate::strategy::ExactScopeStrategy;
    use crate::token::{
        AccessTokenStrategy, HmacShaStrategy, HmacStrategy, JwtAccessTokenStrategy, JwtService,
        Lifespans, RefreshTokenStrategy, SigningKeyPair,
    };

    fn hmac() -> Arc<HmacShaStrategy> {
        Arc::new(HmacShaStrategy::new(
            HmacStrategy::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap(),
            Lifespans::default(),
        ))
    }

    fn granted(scopes: &[&str]) -> Request {
        let mut request = Request::new(Client::public("app"));
        for scope in scopes {
            request.grant_scope(*scope);
        }
        request
    }

    async fn seeded() -> (CoreValidator, Arc<MemoryStore>, String, String) {
        let store = Arc::new(MemoryStore::new());
        let strategy = hmac();
        let original = granted(&["read"]);

        let (access, sig) = strategy.generate_access_token(&original).unwrap();
        store.create_access_token_session(&sig, &original).await.unwrap();
        let (refresh, sig) = strategy.generate_refresh_token(&original).unwrap();
        store.create_refresh_token_session(&sig, &original).await.unwrap();

        let validator = CoreValidator::new(strategy, store.clone(), Arc::new(ExactScopeStrategy));
        (validator, store, access, refresh)
    }

    #[tokio::test]
    async fn test_access_token() {
        let (v, _, access, _) = seeded().await;
        let mut request = AccessRequest::default();
        let used = v
            .introspect_token(&access, TokenUse::AccessToken, &mut request, &[])
            .await
            .unwrap();
        assert_eq!(used, TokenUse::AccessToken);
        assert_eq!(request.request.client.id, "app");
    }

    #[tokio::test]
    async fn test_wrong_hint_falls_through() {
        let (v, _, access, refresh) = seeded().await;

        let used = v
            .introspect_token(&refresh, TokenUse::AccessToken, &mut AccessRequest::default(), &[])
            .await
            .unwrap();
        assert_eq!(used, TokenUse::RefreshToken);

        let used = v
            .introspect_token(&access, TokenUse::RefreshToken, &mut AccessRequest::default(), &[])
            .await
            .unwrap();
        assert_eq!(used, TokenUse::AccessToken);
    }

    #[tokio::test]
    async fn test_refresh_validation_disabled() {
        let (v, _, _, refresh) = seeded().await;
        let v = v.with_refresh_token_validation_disabled(true);
        let err = v
            .introspect_token(&refresh, TokenUse::RefreshToken, &mut AccessRequest::default(), &[])
            .await
            .unwrap_err();
        assert!(err.is_unknown_request());
    }

    #[tokio::test]
    async fn test_scope_not_granted() {
        let (v, _, access, _) = seeded().await;
        let err = v
            .introspect_token(
                &access,
                TokenUse::AccessToken,
                &mut AccessRequest::default(),
                &["write".to_string()],
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidScope);
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_is_inactive() {
        let (v, store, _, refresh) = seeded().await;
        let mut request = AccessRequest::default();
        v.introspect_token(&refresh, TokenUse::RefreshToken, &mut request, &[])
            .await
            .unwrap();
        store.revoke_refresh_token(&request.request.id).await.unwrap();

        let err = v
            .introspect_token(&refresh, TokenUse::RefreshToken, &mut AccessRequest::default(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InactiveToken);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let (v, _, _, _) = seeded().await;
        let (other, _) = hmac().generate_access_token(&Request::default()).unwrap();
        let err = v
            .introspect_token(&other, TokenUse::AccessToken, &mut AccessRequest::default(), &[])
            .await
            .unwrap_err();
        assert!(err.is_unknown_request());
    }

    #[tokio::test]
    async fn test_stateless_jwt() {
        let jwt: Arc<dyn JwtStrategy> = Arc::new(JwtService::new(
            SigningKeyPair::generate_ec().unwrap(),
            "",
        ));
        let core = JwtAccessTokenStrategy::new(jwt.clone(), hmac(), "");
        let mut original = granted(&["read", "write"]);
        original.grant_audience("https://api.example.com");
        let (token, _) = core.generate_access_token(&original).unwrap();

        let v = StatelessJwtValidator::new(jwt, Arc::new(ExactScopeStrategy));
        let mut request = AccessRequest::default();
        let used = v
            .introspect_token(&token, TokenUse::AccessToken, &mut request, &["read".to_string()])
            .await
            .unwrap();

        assert_eq!(used, TokenUse::AccessToken);
        assert_eq!(request.request.id, original.id);
        assert_eq!(request.request.client.id, "app");
        assert!(request.request.granted_scopes.has_all(&["read", "write"]));
        assert!(request.request.granted_audience.has("https://api.example.com"));
        assert!(request.request.session.expires_at(TokenKind::AccessToken).is_some());
    }

    #[tokio::test]
    async fn test_stateless_ignores_opaque_tokens() {
        let jwt: Arc<dyn JwtStrategy> = Arc::new(JwtService::new(
            SigningKeyPair::generate_ec().unwrap(),
            "",
        ));
        let v = StatelessJwtValidator::new(jwt, Arc::new(ExactScopeStrategy));
        let (opaque, _) = hmac().generate_access_token(&Request::default()).unwrap();
        let err = v
            .introspect_token(&opaque, TokenUse::AccessToken, &mut AccessRequest::default(), &[])
            .await
            .unwrap_err();
        assert!(err.is_unknown_request());
    }
}
