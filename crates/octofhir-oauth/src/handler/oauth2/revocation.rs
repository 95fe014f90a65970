//! Token revocation (RFC 7009).

use std::sync::Arc;

use async_trait::async_trait;

use crate::handler::{Handler, HandlerKind, RevocationHandler, TokenUse};
use crate::storage::Storage;
use crate::token::CoreStrategy;
use crate::types::{Client, Request};
use crate::{ErrorKind, OAuthError, OAuthResult};

/// Revokes the access and refresh tokens issued for one grant.
///
/// Revoking either token of a pair revokes both. Tokens that are unknown or
/// already revoked are accepted silently.
#[derive(Clone)]
pub struct TokenRevocationHandler {
    strategy: Arc<dyn CoreStrategy>,
    storage: Arc<dyn Storage>,
}

impl TokenRevocationHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(strategy: Arc<dyn CoreStrategy>, storage: Arc<dyn Storage>) -> Self {
        Self { strategy, storage }
    }

    async fn lookup(&self, token_use: TokenUse, token: &str) -> OAuthResult<Option<Request>> {
        match token_use {
            TokenUse::AccessToken => {
                let signature = self.strategy.access_token_signature(token);
                self.storage.get_access_token_session(&signature).await
            }
            TokenUse::RefreshToken => {
                let signature = self.strategy.refresh_token_signature(token);
                self.storage.get_refresh_token_session(&signature).await
            }
        }
    }
}

impl Handler for TokenRevocationHandler {
    fn kind(&self) -> HandlerKind {
        HandlerKind::TOKEN_REVOCATION
    }
}

#[async_trait]
impl RevocationHandler for TokenRevocationHandler {
    async fn revoke_token(
        &self,
        token: &str,
        hint: Option<TokenUse>,
        client: &Client,
    ) -> OAuthResult<()> {
        let first = hint.unwrap_or(TokenUse::RefreshToken);

        let mut found = None;
        for token_use in [first, first.other()] {
            match self.lookup(token_use, token).await {
                Ok(Some(request)) => {
                    found = Some(request);
                    break;
                }
                Ok(None) => {}
                Err(e) if e.is(ErrorKind::InactiveToken) => return Ok(()),
                Err(e) => return Err(e),
            }
        }

        let Some(original) = found else {
            tracing::debug!(client_id = %client.id, "Revocation of unknown token ignored");
            return Ok(());
        };

        if original.client.id != client.id {
            return Err(OAuthError::unauthorized_client()
                .with_hint("The OAuth 2.0 Client is not allowed to revoke this token."));
        }

        self.storage.revoke_refresh_token(&original.id).await?;
        self.storage.revoke_access_token(&original.id).await?;
        tracing::debug!(request_id = %original.id, "Revoked token family");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{AccessTokenStorage, MemoryStore, RefreshTokenStorage};
    use crate::token::{
        AccessTokenStrategy, HmacShaStrategy, HmacStrategy, Lifespans, RefreshTokenStrategy,
    };

    struct Setup {
        handler: TokenRevocationHandler,
        store: Arc<MemoryStore>,
        strategy: Arc<HmacShaStrategy>,
        access: String,
        refresh: String,
    }

    async fn setup() -> Setup {
        let store = Arc::new(MemoryStore::new());
        let strategy = Arc::new(HmacShaStrategy::new(
            HmacStrategy::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap(),
            Lifespans::default(),
        ));
        let original = Request::new(Client::public("app"));
        let (access, sig) = strategy.generate_access_token(&original).unwrap();
        store.create_access_token_session(&sig, &original).await.unwrap();
        let (refresh, sig) = strategy.generate_refresh_token(&original).unwrap();
        store.create_refresh_token_session(&sig, &original).await.unwrap();

        Setup {
            handler: TokenRevocationHandler::new(strategy.clone(), store.clone()),
            store,
            strategy,
            access,
            refresh,
        }
    }

    async fn family_alive(s: &Setup) -> (bool, bool) {
        let access = s
            .store
            .get_access_token_session(&s.strategy.access_token_signature(&s.access))
            .await
            .unwrap()
            .is_some();
        let refresh = s
            .store
            .get_refresh_token_session(&s.strategy.refresh_token_signature(&s.refresh))
            .await
            .is_ok();
        (access, refresh)
    }

    #[tokio::test]
    async fn test_revoking_refresh_revokes_both() {
        let s = setup().await;
        s.handler
            .revoke_token(&s.refresh, None, &Client::public("app"))
            .await
            .unwrap();
        assert_eq!(family_alive(&s).await, (false, false));
    }

    #[tokio::test]
    async fn test_revoking_access_with_wrong_hint() {
        let s = setup().await;
        s.handler
            .revoke_token(&s.access, Some(TokenUse::RefreshToken), &Client::public("app"))
            .await
            .unwrap();
        assert_eq!(family_alive(&s).await, (false, false));
    }

    #[tokio::test]
    async fn test_other_client_rejected() {
        let s = setup().await;
        let err = s
            .handler
            .revoke_token(&s.access, None, &Client::public("intruder"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnauthorizedClient);
        assert_eq!(family_alive(&s).await, (true, true));
    }

    #[tokio::test]
    async fn test_unknown_and_repeated_revocation_succeed() {
        let s = setup().await;
        let client = Client::public("app");
        assert!(s.handler.revoke_token("garbage", None, &client).await.is_ok());

        s.handler.revoke_token(&s.refresh, None, &client).await.unwrap();
        assert!(s.handler.revoke_token(&s.refresh, None, &client).await.is_ok());
    }
}
