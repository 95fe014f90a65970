//! Endpoint handlers.
//!
//! A handler implements one protocol extension. It can serve up to four
//! roles, one per endpoint:
//!
//! | Role | Trait | Dispatch |
//! |------|-------|----------|
//! | Authorization endpoint | [`AuthorizeEndpointHandler`] | every claiming handler runs |
//! | Token endpoint | [`TokenEndpointHandler`] | first claiming handler runs |
//! | Introspection | [`TokenIntrospector`] | first non-`unknown_request` result wins |
//! | Revocation | [`RevocationHandler`] | first non-`unknown_request` result wins |
//!
//! Handlers are stored in [`HandlerRegistry`] instances, deduplicated by
//! [`HandlerKind`].

pub mod oauth2;
pub mod openid;
pub mod registry;

use std::fmt;

use async_trait::async_trait;
use url::Url;

use crate::types::{AccessRequest, AccessResponse, AuthorizeRequest, AuthorizeResponse, Client};
use crate::{OAuthError, OAuthResult};

pub use registry::{
    AuthorizeEndpointHandlers, HandlerRegistry, RevocationHandlers, TokenEndpointHandlers,
    TokenIntrospectionHandlers,
};

/// Stable identity of a handler implementation.
///
/// Two handlers with the same kind are alternatives; a registry keeps only
/// the first one appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerKind(pub &'static str);

impl HandlerKind {
    /// Client credentials grant.
    pub const CLIENT_CREDENTIALS: Self = Self("client_credentials");
    /// Authorization code grant, both endpoints.
    pub const AUTHORIZE_CODE: Self = Self("authorize_code");
    /// Refresh token grant.
    pub const REFRESH_TOKEN: Self = Self("refresh_token");
    /// OpenID Connect implicit `id_token` response type.
    pub const OPENID_IMPLICIT: Self = Self("openid_implicit");
    /// Storage-backed introspection.
    pub const CORE_VALIDATOR: Self = Self("core_validator");
    /// JWT-only introspection.
    pub const STATELESS_JWT_VALIDATOR: Self = Self("stateless_jwt_validator");
    /// Token revocation.
    pub const TOKEN_REVOCATION: Self = Self("token_revocation");

    /// The identity string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Common supertrait of all handler roles.
pub trait Handler: Send + Sync {
    /// Identity used for registry deduplication.
    fn kind(&self) -> HandlerKind;
}

/// Authorization endpoint role.
#[async_trait]
pub trait AuthorizeEndpointHandler: Handler {
    /// Returns `true` if the handler contributes to this request.
    fn can_handle_authorize_endpoint_request(&self, request: &AuthorizeRequest) -> bool;

    /// Adds this handler's parameters to the response and marks the response
    /// types it served as handled.
    async fn handle_authorize_endpoint_request(
        &self,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> OAuthResult<()>;
}

/// Returns the redirect URI of an authorization request once it is known to
/// be present and registered for the requesting client.
///
/// # Errors
///
/// Returns `invalid_request` if the URI is missing or unregistered.
pub fn registered_redirect_uri(request: &AuthorizeRequest) -> OAuthResult<&Url> {
    let redirect_uri = request.redirect_uri.as_ref().ok_or_else(|| {
        OAuthError::invalid_request().with_hint("The 'redirect_uri' parameter is required.")
    })?;
    if !request.request.client.is_redirect_uri_allowed(redirect_uri.as_str()) {
        return Err(OAuthError::invalid_request().with_hint(
            "The 'redirect_uri' parameter does not match any of the OAuth 2.0 Client's pre-registered redirect urls.",
        ));
    }
    Ok(redirect_uri)
}

/// Token endpoint role.
#[async_trait]
pub trait TokenEndpointHandler: Handler {
    /// Returns `true` if the handler claims this grant.
    fn can_handle_token_endpoint_request(&self, request: &AccessRequest) -> bool;

    /// Returns `true` if the grant does not need an authenticated client.
    fn can_skip_client_auth(&self, _request: &AccessRequest) -> bool {
        false
    }

    /// Validates the grant and records granted scopes, audience and expiry.
    async fn handle_token_endpoint_request(&self, request: &mut AccessRequest)
    -> OAuthResult<()>;

    /// Issues tokens into the response.
    async fn populate_token_endpoint_response(
        &self,
        request: &AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()>;
}

/// What a presented token is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenUse {
    /// An access token.
    #[default]
    AccessToken,
    /// A refresh token.
    RefreshToken,
}

impl TokenUse {
    /// The `token_type_hint` value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Parses a `token_type_hint` value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }

    /// The other token use.
    #[must_use]
    pub fn other(&self) -> Self {
        match self {
            Self::AccessToken => Self::RefreshToken,
            Self::RefreshToken => Self::AccessToken,
        }
    }
}

impl fmt::Display for TokenUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Introspection role.
#[async_trait]
pub trait TokenIntrospector: Handler {
    /// Validates a token.
    ///
    /// On success the stored request is copied into `request` and the actual
    /// use of the token is returned. Every requested scope must have been
    /// granted to the token.
    ///
    /// # Errors
    ///
    /// Returns `unknown_request` when this introspector does not recognise
    /// the token, which lets the next one try.
    async fn introspect_token(
        &self,
        token: &str,
        token_use: TokenUse,
        request: &mut AccessRequest,
        scopes: &[String],
    ) -> OAuthResult<TokenUse>;
}

/// Revocation role.
#[async_trait]
pub trait RevocationHandler: Handler {
    /// Revokes a token and every token issued with it.
    ///
    /// # Errors
    ///
    /// Returns `unknown_request` when this handler does not recognise the
    /// token, which lets the next one try.
    async fn revoke_token(
        &self,
        token: &str,
        hint: Option<TokenUse>,
        client: &Client,
    ) -> OAuthResult<()>;
}
