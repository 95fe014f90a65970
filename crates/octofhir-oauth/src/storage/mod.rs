//! Storage traits for clients and token sessions.
//!
//! Token sessions are keyed by the token *signature*, never by the token
//! itself. Every session is a sanitized [`Request`]; tokens issued for the
//! same grant share the request id, which is what revocation keys on.
//!
//! # Implementations
//!
//! - [`memory::MemoryStore`] - in-process store for tests and single-node use
//!
//! Persistent backends implement the same traits in their own crates.

pub mod memory;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::OAuthResult;
use crate::types::{Client, Request};

pub use memory::MemoryStore;

/// Client registry.
#[async_trait]
pub trait ClientManager: Send + Sync {
    /// Loads a client by id.
    ///
    /// # Returns
    ///
    /// Returns `Some(client)` if registered, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend fails.
    async fn get_client(&self, id: &str) -> OAuthResult<Option<Client>>;

    /// Checks that a client assertion `jti` has not been seen.
    ///
    /// # Errors
    ///
    /// Returns `invalid_client` if the `jti` was already used and has not expired.
    async fn client_assertion_jwt_valid(&self, jti: &str) -> OAuthResult<()>;

    /// Records a client assertion `jti` until `expires_at`.
    async fn set_client_assertion_jwt(&self, jti: &str, expires_at: OffsetDateTime)
    -> OAuthResult<()>;
}

/// Access token sessions.
#[async_trait]
pub trait AccessTokenStorage: Send + Sync {
    /// Stores a session under an access token signature.
    ///
    /// Storing the same request twice under one signature is a no-op. A
    /// different request under an existing signature is a `conflict` error.
    async fn create_access_token_session(&self, signature: &str, request: &Request)
    -> OAuthResult<()>;

    /// Loads the session for an access token signature.
    async fn get_access_token_session(&self, signature: &str) -> OAuthResult<Option<Request>>;

    /// Deletes the session for an access token signature.
    async fn delete_access_token_session(&self, signature: &str) -> OAuthResult<()>;
}

/// Refresh token sessions.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Stores a session under a refresh token signature.
    async fn create_refresh_token_session(
        &self,
        signature: &str,
        request: &Request,
    ) -> OAuthResult<()>;

    /// Loads the session for a refresh token signature.
    ///
    /// # Errors
    ///
    /// Returns an `inactive_token` error if the token was revoked.
    async fn get_refresh_token_session(&self, signature: &str) -> OAuthResult<Option<Request>>;

    /// Deletes the session for a refresh token signature.
    async fn delete_refresh_token_session(&self, signature: &str) -> OAuthResult<()>;
}

/// Authorization code sessions.
#[async_trait]
pub trait AuthorizeCodeStorage: Send + Sync {
    /// Stores a session under an authorization code signature.
    async fn create_authorize_code_session(
        &self,
        signature: &str,
        request: &Request,
    ) -> OAuthResult<()>;

    /// Loads the session for an authorization code signature.
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` if the code was already exchanged.
    async fn get_authorize_code_session(&self, signature: &str) -> OAuthResult<Option<Request>>;

    /// Marks an authorization code as used.
    ///
    /// The check and the update are one atomic step: when several callers
    /// race on the same code, exactly one of them succeeds.
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` if the code is unknown or was already used.
    async fn invalidate_authorize_code_session(&self, signature: &str) -> OAuthResult<()>;
}

/// Revocation by request id.
#[async_trait]
pub trait TokenRevocationStorage: Send + Sync {
    /// Revokes every access token issued for a request.
    ///
    /// A request id may own several signatures, for example after repeated
    /// population of the same access request. All of them are revoked.
    async fn revoke_access_token(&self, request_id: &str) -> OAuthResult<()>;

    /// Revokes every refresh token issued for a request.
    async fn revoke_refresh_token(&self, request_id: &str) -> OAuthResult<()>;
}

/// Everything the built-in handlers need from a backend.
pub trait Storage:
    ClientManager
    + AccessTokenStorage
    + RefreshTokenStorage
    + AuthorizeCodeStorage
    + TokenRevocationStorage
{
}

impl<T> Storage for T where
    T: ClientManager
        + AccessTokenStorage
        + RefreshTokenStorage
        + AuthorizeCodeStorage
        + TokenRevocationStorage
{
}
