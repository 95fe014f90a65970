//! In-memory storage backend.
//!
//! Backed by [`DashMap`] so concurrent handlers only contend on the shard
//! holding the key they touch. Nothing is persisted.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use time::OffsetDateTime;

use super::{
    AccessTokenStorage, AuthorizeCodeStorage, ClientManager, RefreshTokenStorage,
    TokenRevocationStorage,
};
use crate::types::{Client, Request, TokenKind};
use crate::{OAuthError, OAuthResult};

#[derive(Debug, Clone)]
struct StoredSession {
    request: Request,
    active: bool,
}

/// In-memory implementation of every storage trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    clients: DashMap<String, Client>,
    access_tokens: DashMap<String, Request>,
    refresh_tokens: DashMap<String, StoredSession>,
    authorize_codes: DashMap<String, StoredSession>,
    access_token_request_ids: DashMap<String, Vec<String>>,
    refresh_token_request_ids: DashMap<String, Vec<String>>,
    used_assertion_jtis: DashMap<String, OffsetDateTime>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a client.
    pub fn add_client(&self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }

    /// Registers a client, builder-style.
    #[must_use]
    pub fn with_client(self, client: Client) -> Self {
        self.add_client(client);
        self
    }

    /// Number of live access token sessions.
    #[must_use]
    pub fn access_token_count(&self) -> usize {
        self.access_tokens.len()
    }

    /// Number of refresh token sessions, active or not.
    #[must_use]
    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }
}

fn insert_once<V: Clone>(
    map: &DashMap<String, V>,
    signature: &str,
    request: &Request,
    id_of: impl Fn(&V) -> &str,
    value: V,
) -> OAuthResult<()> {
    match map.entry(signature.to_string()) {
        Entry::Occupied(existing) => {
            if id_of(existing.get()) == request.id {
                Ok(())
            } else {
                let bound_to = id_of(existing.get());
                Err(OAuthError::conflict()
                    .with_debug(format!("signature already bound to request {bound_to}")))
            }
        }
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
    }
}

fn track(ids: &DashMap<String, Vec<String>>, request_id: &str, signature: &str) {
    let mut signatures = ids.entry(request_id.to_string()).or_default();
    if !signatures.iter().any(|s| s == signature) {
        signatures.push(signature.to_string());
    }
}

#[async_trait]
impl ClientManager for MemoryStore {
    async fn get_client(&self, id: &str) -> OAuthResult<Option<Client>> {
        Ok(self.clients.get(id).map(|c| c.clone()))
    }

    async fn client_assertion_jwt_valid(&self, jti: &str) -> OAuthResult<()> {
        match self.used_assertion_jtis.get(jti) {
            Some(expires_at) if *expires_at > OffsetDateTime::now_utc() => {
                Err(OAuthError::invalid_client()
                    .with_hint("The jti was already used."))
            }
            _ => Ok(()),
        }
    }

    async fn set_client_assertion_jwt(
        &self,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> OAuthResult<()> {
        let now = OffsetDateTime::now_utc();
        self.used_assertion_jtis.retain(|_, exp| *exp > now);

        match self.used_assertion_jtis.entry(jti.to_string()) {
            Entry::Occupied(_) => Err(OAuthError::invalid_client()
                .with_hint("The jti was already used.")),
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl AccessTokenStorage for MemoryStore {
    async fn create_access_token_session(
        &self,
        signature: &str,
        request: &Request,
    ) -> OAuthResult<()> {
        insert_once(
            &self.access_tokens,
            signature,
            request,
            |r| r.id.as_str(),
            request.clone(),
        )?;
        track(&self.access_token_request_ids, &request.id, signature);
        Ok(())
    }

    async fn get_access_token_session(&self, signature: &str) -> OAuthResult<Option<Request>> {
        Ok(self.access_tokens.get(signature).map(|r| r.clone()))
    }

    async fn delete_access_token_session(&self, signature: &str) -> OAuthResult<()> {
        self.access_tokens.remove(signature);
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStorage for MemoryStore {
    async fn create_refresh_token_session(
        &self,
        signature: &str,
        request: &Request,
    ) -> OAuthResult<()> {
        insert_once(
            &self.refresh_tokens,
            signature,
            request,
            |s| s.request.id.as_str(),
            StoredSession {
                request: request.clone(),
                active: true,
            },
        )?;
        track(&self.refresh_token_request_ids, &request.id, signature);
        Ok(())
    }

    async fn get_refresh_token_session(&self, signature: &str) -> OAuthResult<Option<Request>> {
        match self.refresh_tokens.get(signature) {
            Some(stored) if !stored.active => Err(OAuthError::inactive_token()
                .with_hint("The refresh token was revoked.")),
            Some(stored) => Ok(Some(stored.request.clone())),
            None => Ok(None),
        }
    }

    async fn delete_refresh_token_session(&self, signature: &str) -> OAuthResult<()> {
        self.refresh_tokens.remove(signature);
        Ok(())
    }
}

#[async_trait]
impl AuthorizeCodeStorage for MemoryStore {
    async fn create_authorize_code_session(
        &self,
        signature: &str,
        request: &Request,
    ) -> OAuthResult<()> {
        insert_once(
            &self.authorize_codes,
            signature,
            request,
            |s| s.request.id.as_str(),
            StoredSession {
                request: request.clone(),
                active: true,
            },
        )
    }

    async fn get_authorize_code_session(&self, signature: &str) -> OAuthResult<Option<Request>> {
        match self.authorize_codes.get(signature) {
            Some(stored) if !stored.active => Err(OAuthError::invalid_grant()
                .with_hint("The authorization code has already been used.")),
            Some(stored) => Ok(Some(stored.request.clone())),
            None => Ok(None),
        }
    }

    async fn invalidate_authorize_code_session(&self, signature: &str) -> OAuthResult<()> {
        let mut stored = self.authorize_codes.get_mut(signature).ok_or_else(|| {
            OAuthError::invalid_grant().with_hint("The authorization code has not been found.")
        })?;
        if !stored.active {
            return Err(OAuthError::invalid_grant()
                .with_hint("The authorization code has already been used."));
        }
        stored.active = false;
        Ok(())
    }
}

#[async_trait]
impl TokenRevocationStorage for MemoryStore {
    async fn revoke_access_token(&self, request_id: &str) -> OAuthResult<()> {
        if let Some((_, signatures)) = self.access_token_request_ids.remove(request_id) {
            for signature in &signatures {
                self.access_tokens.remove(signature);
            }
        }
        Ok(())
    }

    /// Revoked refresh tokens stay behind as inactive entries so a replay is
    /// told apart from an unknown token. Entries are dropped once their
    /// refresh lifespan has passed.
    async fn revoke_refresh_token(&self, request_id: &str) -> OAuthResult<()> {
        if let Some((_, signatures)) = self.refresh_token_request_ids.remove(request_id) {
            for signature in &signatures {
                if let Some(mut stored) = self.refresh_tokens.get_mut(signature) {
                    stored.active = false;
                }
            }
        }

        let now = OffsetDateTime::now_utc();
        self.refresh_tokens.retain(|_, stored| {
            stored.active || !stored.request.session.is_expired(TokenKind::RefreshToken, now)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use time::Duration;
    use tokio_test::block_on;

    fn request_for(client_id: &str) -> Request {
        Request::new(Client::confidential(client_id, "hash"))
    }

    #[test]
    fn test_client_lookup() {
        let store = MemoryStore::new().with_client(Client::public("spa"));
        block_on(async {
            assert!(store.get_client("spa").await.unwrap().is_some());
            assert!(store.get_client("nope").await.unwrap().is_none());

            store.add_client(Client::public("nope"));
            assert!(store.get_client("nope").await.unwrap().is_some());
        });
    }

    #[tokio::test]
    async fn test_access_token_session_lifecycle() {
        let store = MemoryStore::new();
        let request = request_for("svc");

        store.create_access_token_session("sig", &request).await.unwrap();
        let loaded = store.get_access_token_session("sig").await.unwrap().unwrap();
        assert_eq!(loaded.id, request.id);

        store.delete_access_token_session("sig").await.unwrap();
        assert!(store.get_access_token_session("sig").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_is_noop() {
        let store = MemoryStore::new();
        let request = request_for("svc");

        store.create_access_token_session("sig", &request).await.unwrap();
        store.create_access_token_session("sig", &request).await.unwrap();
        assert_eq!(store.access_token_count(), 1);
    }

    #[tokio::test]
    async fn test_conflicting_create_fails() {
        let store = MemoryStore::new();
        store
            .create_access_token_session("sig", &request_for("a"))
            .await
            .unwrap();

        let err = store
            .create_access_token_session("sig", &request_for("b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_revoke_by_request_id() {
        let store = MemoryStore::new();
        let request = request_for("svc");

        store.create_access_token_session("at-sig", &request).await.unwrap();
        store.create_refresh_token_session("rt-sig", &request).await.unwrap();

        store.revoke_access_token(&request.id).await.unwrap();
        store.revoke_refresh_token(&request.id).await.unwrap();

        assert!(store.get_access_token_session("at-sig").await.unwrap().is_none());
        let err = store.get_refresh_token_session("rt-sig").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InactiveToken);
    }

    #[tokio::test]
    async fn test_revoke_covers_every_token_of_a_request() {
        let store = MemoryStore::new();
        let request = request_for("svc");

        store.create_access_token_session("at-1", &request).await.unwrap();
        store.create_access_token_session("at-2", &request).await.unwrap();
        store.create_refresh_token_session("rt-1", &request).await.unwrap();
        store.create_refresh_token_session("rt-2", &request).await.unwrap();

        store.revoke_access_token(&request.id).await.unwrap();
        store.revoke_refresh_token(&request.id).await.unwrap();

        assert!(store.get_access_token_session("at-1").await.unwrap().is_none());
        assert!(store.get_access_token_session("at-2").await.unwrap().is_none());
        assert_eq!(store.access_token_count(), 0);
        for signature in ["rt-1", "rt-2"] {
            let err = store.get_refresh_token_session(signature).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InactiveToken);
        }
    }

    #[tokio::test]
    async fn test_revoke_leaves_other_requests_alone() {
        let store = MemoryStore::new();
        let revoked = request_for("svc");
        let kept = request_for("svc");

        store.create_access_token_session("at-revoked", &revoked).await.unwrap();
        store.create_access_token_session("at-kept", &kept).await.unwrap();
        store.revoke_access_token(&revoked.id).await.unwrap();

        assert!(store.get_access_token_session("at-kept").await.unwrap().is_some());
        assert_eq!(store.access_token_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_revoked_refresh_tokens_are_dropped() {
        let store = MemoryStore::new();
        let mut stale = request_for("svc");
        stale.session.set_expires_at(
            TokenKind::RefreshToken,
            OffsetDateTime::now_utc() - Duration::minutes(1),
        );
        let mut live = request_for("svc");
        live.session.set_expires_at(
            TokenKind::RefreshToken,
            OffsetDateTime::now_utc() + Duration::hours(1),
        );

        store.create_refresh_token_session("rt-stale", &stale).await.unwrap();
        store.create_refresh_token_session("rt-live", &live).await.unwrap();
        store.revoke_refresh_token(&stale.id).await.unwrap();
        assert_eq!(store.refresh_token_count(), 1);

        store.revoke_refresh_token(&live.id).await.unwrap();
        assert_eq!(store.refresh_token_count(), 1);
        let err = store.get_refresh_token_session("rt-live").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InactiveToken);
    }

    #[tokio::test]
    async fn test_authorize_code_single_use() {
        let store = MemoryStore::new();
        let request = request_for("web");

        store.create_authorize_code_session("code-sig", &request).await.unwrap();
        assert!(store.get_authorize_code_session("code-sig").await.unwrap().is_some());

        store.invalidate_authorize_code_session("code-sig").await.unwrap();
        let err = store.get_authorize_code_session("code-sig").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);

        let err = store
            .invalidate_authorize_code_session("code-sig")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
        assert!(err.hint().unwrap().contains("already been used"));
    }

    #[tokio::test]
    async fn test_concurrent_invalidation_has_one_winner() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store
            .create_authorize_code_session("code-sig", &request_for("web"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.invalidate_authorize_code_session("code-sig").await
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_unknown_code_cannot_be_invalidated() {
        let store = MemoryStore::new();
        let err = store
            .invalidate_authorize_code_session("missing")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrant);
    }

    #[tokio::test]
    async fn test_assertion_jti_replay() {
        let store = MemoryStore::new();
        let exp = OffsetDateTime::now_utc() + Duration::minutes(5);

        store.client_assertion_jwt_valid("jti-1").await.unwrap();
        store.set_client_assertion_jwt("jti-1", exp).await.unwrap();

        assert!(store.client_assertion_jwt_valid("jti-1").await.is_err());
        assert!(store.set_client_assertion_jwt("jti-1", exp).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_jti_is_forgotten() {
        let store = MemoryStore::new();
        let past = OffsetDateTime::now_utc() - Duration::minutes(1);

        store.set_client_assertion_jwt("old", past).await.unwrap();
        assert!(store.client_assertion_jwt_valid("old").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_creates() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let request = request_for("svc");
                store
                    .create_access_token_session(&format!("sig-{i}"), &request)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.access_token_count(), 16);
    }
}
