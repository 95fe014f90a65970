//! Provider composition.
//!
//! A [`Factory`] builds one handler from the configuration, the storage and
//! the [`CommonStrategy`], and reports through [`Capabilities`] which
//! endpoint roles that handler serves. [`compose`] registers every produced
//! handler in each matching registry.
//!
//! ```ignore
//! let builder = compose(
//!     &config,
//!     storage,
//!     strategy,
//!     None,
//!     &[oauth2_client_credentials_grant_factory, oauth2_token_introspection_factory],
//! );
//! let provider = builder.build()?;
//! ```

mod factories;
mod strategy;

use std::sync::Arc;

use crate::OAuthResult;
use crate::config::ProviderConfig;
use crate::handler::{
    AuthorizeEndpointHandler, RevocationHandler, TokenEndpointHandler, TokenIntrospector,
};
use crate::provider::{Provider, ProviderBuilder};
use crate::storage::Storage;
use crate::strategy::Hasher;
use crate::token::{CommonStrategy, JwtService, SigningKeyPair};

pub use factories::{
    oauth2_authorize_explicit_factory, oauth2_client_credentials_grant_factory,
    oauth2_refresh_token_grant_factory, oauth2_stateless_jwt_introspection_factory,
    oauth2_token_introspection_factory, oauth2_token_revocation_factory,
    openid_connect_explicit_factory, openid_connect_implicit_factory,
    openid_connect_refresh_factory,
};
pub use strategy::{new_oauth2_hmac_strategy, new_oauth2_jwt_strategy, new_openid_connect_strategy};

/// Builds one handler.
pub type Factory = fn(&ProviderConfig, &Arc<dyn Storage>, &CommonStrategy) -> Capabilities;

/// The endpoint roles a composed handler fulfils.
#[derive(Default, Clone)]
pub struct Capabilities {
    /// Authorization endpoint role.
    pub authorize: Option<Arc<dyn AuthorizeEndpointHandler>>,
    /// Token endpoint role.
    pub token: Option<Arc<dyn TokenEndpointHandler>>,
    /// Introspection role.
    pub introspection: Option<Arc<dyn TokenIntrospector>>,
    /// Revocation role.
    pub revocation: Option<Arc<dyn RevocationHandler>>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("authorize", &self.authorize.as_ref().map(|h| h.kind()))
            .field("token", &self.token.as_ref().map(|h| h.kind()))
            .field("introspection", &self.introspection.as_ref().map(|h| h.kind()))
            .field("revocation", &self.revocation.as_ref().map(|h| h.kind()))
            .finish()
    }
}

impl Capabilities {
    /// A handler serving only the token endpoint.
    #[must_use]
    pub fn token<H: TokenEndpointHandler + 'static>(handler: H) -> Self {
        Self {
            token: Some(Arc::new(handler)),
            ..Default::default()
        }
    }

    /// A handler serving only the authorization endpoint.
    #[must_use]
    pub fn authorize<H: AuthorizeEndpointHandler + 'static>(handler: H) -> Self {
        Self {
            authorize: Some(Arc::new(handler)),
            ..Default::default()
        }
    }

    /// A handler serving both the authorization and the token endpoint.
    #[must_use]
    pub fn authorize_and_token<H>(handler: H) -> Self
    where
        H: AuthorizeEndpointHandler + TokenEndpointHandler + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            authorize: Some(handler.clone()),
            token: Some(handler),
            ..Default::default()
        }
    }

    /// A token introspector.
    #[must_use]
    pub fn introspection<H: TokenIntrospector + 'static>(handler: H) -> Self {
        Self {
            introspection: Some(Arc::new(handler)),
            ..Default::default()
        }
    }

    /// A revocation handler.
    #[must_use]
    pub fn revocation<H: RevocationHandler + 'static>(handler: H) -> Self {
        Self {
            revocation: Some(Arc::new(handler)),
            ..Default::default()
        }
    }
}

/// Runs each factory once and registers its handler in every matching
/// registry. Registration keeps the factory order; a later handler of an
/// already registered kind is dropped.
///
/// The returned builder carries the storage and, if given, the hasher.
#[must_use]
pub fn compose(
    config: &ProviderConfig,
    storage: Arc<dyn Storage>,
    strategy: CommonStrategy,
    hasher: Option<Arc<dyn Hasher>>,
    factories: &[Factory],
) -> ProviderBuilder {
    let mut builder = ProviderBuilder::new(config.clone()).with_storage(storage.clone());
    if let Some(hasher) = hasher {
        builder = builder.with_hasher(hasher);
    }

    for factory in factories {
        let capabilities = factory(config, &storage, &strategy);
        if let Some(handler) = capabilities.authorize {
            builder.append_authorize_endpoint_handler(handler);
        }
        if let Some(handler) = capabilities.token {
            builder.append_token_endpoint_handler(handler);
        }
        if let Some(handler) = capabilities.introspection {
            builder.append_token_introspection_handler(handler);
        }
        if let Some(handler) = capabilities.revocation {
            builder.append_revocation_handler(handler);
        }
    }

    builder
}

/// Builds a provider with every built-in grant enabled.
///
/// Opaque HMAC tokens signed with `secret` (plus the configured rotated
/// secrets), ID tokens signed with `key`. The OpenID Connect variants of the
/// authorization code and refresh handlers also serve plain OAuth 2.0
/// requests.
///
/// # Errors
///
/// Returns an error if a secret is too short or the configuration is invalid.
pub fn compose_all_enabled(
    config: &ProviderConfig,
    storage: Arc<dyn Storage>,
    secret: &[u8],
    key: SigningKeyPair,
) -> OAuthResult<Provider> {
    let rotated: Vec<&[u8]> = config
        .rotated_global_secrets
        .iter()
        .map(|s| s.as_bytes())
        .collect();
    let core = new_oauth2_hmac_strategy(config, secret, &rotated)?;
    let strategy = CommonStrategy::new(
        core,
        new_openid_connect_strategy(config, key.clone()),
        Arc::new(JwtService::new(key, config.id_token_issuer.clone())),
    );

    compose(
        config,
        storage,
        strategy,
        None,
        &[
            oauth2_client_credentials_grant_factory,
            openid_connect_explicit_factory,
            openid_connect_refresh_factory,
            openid_connect_implicit_factory,
            oauth2_token_introspection_factory,
            oauth2_token_revocation_factory,
        ],
    )
    .build()
}
