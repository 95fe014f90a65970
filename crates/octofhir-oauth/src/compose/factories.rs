//! Built-in handler factories.

use std::sync::Arc;

use super::Capabilities;
use crate::config::ProviderConfig;
use crate::handler::oauth2::{
    AuthorizeExplicitGrantHandler, ClientCredentialsGrantHandler, CoreValidator, HandleHelper,
    RefreshTokenGrantHandler, StatelessJwtValidator, TokenRevocationHandler,
};
use crate::handler::openid::{IdTokenHandleHelper, OpenIdConnectImplicitHandler};
use crate::storage::Storage;
use crate::strategy::{audience_strategy, scope_strategy};
use crate::token::CommonStrategy;
use crate::types::TokenKind;

fn handle_helper(
    config: &ProviderConfig,
    storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> HandleHelper {
    HandleHelper::new(
        strategy.core().clone(),
        storage.clone(),
        config.lifespan(TokenKind::AccessToken),
    )
    .with_redacted_parameters(config.redacted_parameters.clone())
}

fn authorize_code_handler(
    config: &ProviderConfig,
    storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> AuthorizeExplicitGrantHandler {
    AuthorizeExplicitGrantHandler::new(
        handle_helper(config, storage, strategy),
        strategy.core().clone(),
        storage.clone(),
        scope_strategy(config.scope_strategy),
        audience_strategy(config.audience_strategy),
        config.refresh_token_scopes.clone(),
    )
}

fn refresh_token_handler(
    config: &ProviderConfig,
    storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> RefreshTokenGrantHandler {
    RefreshTokenGrantHandler::new(
        handle_helper(config, storage, strategy),
        strategy.core().clone(),
        storage.clone(),
        scope_strategy(config.scope_strategy),
        audience_strategy(config.audience_strategy),
        config.refresh_token_scopes.clone(),
    )
}

// ============================================================================
// OAuth 2.0
// ============================================================================

/// `client_credentials` grant.
pub fn oauth2_client_credentials_grant_factory(
    config: &ProviderConfig,
    storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> Capabilities {
    Capabilities::token(ClientCredentialsGrantHandler::new(
        handle_helper(config, storage, strategy),
        scope_strategy(config.scope_strategy),
        audience_strategy(config.audience_strategy),
    ))
}

/// `code` response type and `authorization_code` grant.
pub fn oauth2_authorize_explicit_factory(
    config: &ProviderConfig,
    storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> Capabilities {
    Capabilities::authorize_and_token(authorize_code_handler(config, storage, strategy))
}

/// `refresh_token` grant.
pub fn oauth2_refresh_token_grant_factory(
    config: &ProviderConfig,
    storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> Capabilities {
    Capabilities::token(refresh_token_handler(config, storage, strategy))
}

/// Storage-backed introspection of access and refresh tokens.
pub fn oauth2_token_introspection_factory(
    config: &ProviderConfig,
    storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> Capabilities {
    Capabilities::introspection(
        CoreValidator::new(
            strategy.core().clone(),
            storage.clone(),
            scope_strategy(config.scope_strategy),
        )
        .with_refresh_token_validation_disabled(config.disable_refresh_token_validation),
    )
}

/// Introspection of JWT access tokens by signature and claims alone.
pub fn oauth2_stateless_jwt_introspection_factory(
    config: &ProviderConfig,
    _storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> Capabilities {
    Capabilities::introspection(StatelessJwtValidator::new(
        strategy.jwt().clone(),
        scope_strategy(config.scope_strategy),
    ))
}

/// Access and refresh token revocation.
pub fn oauth2_token_revocation_factory(
    _config: &ProviderConfig,
    storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> Capabilities {
    Capabilities::revocation(TokenRevocationHandler::new(
        strategy.core().clone(),
        storage.clone(),
    ))
}

// ============================================================================
// OpenID Connect
// ============================================================================

/// Authorization code flow issuing an ID token for `openid` grants.
pub fn openid_connect_explicit_factory(
    config: &ProviderConfig,
    storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> Capabilities {
    Capabilities::authorize_and_token(
        authorize_code_handler(config, storage, strategy)
            .with_id_token_helper(IdTokenHandleHelper::new(strategy.openid().clone())),
    )
}

/// Refresh grant issuing a fresh ID token for `openid` grants.
pub fn openid_connect_refresh_factory(
    config: &ProviderConfig,
    storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> Capabilities {
    Capabilities::token(
        refresh_token_handler(config, storage, strategy)
            .with_id_token_helper(IdTokenHandleHelper::new(strategy.openid().clone())),
    )
}

/// `id_token` response type.
pub fn openid_connect_implicit_factory(
    config: &ProviderConfig,
    _storage: &Arc<dyn Storage>,
    strategy: &CommonStrategy,
) -> Capabilities {
    Capabilities::authorize(OpenIdConnectImplicitHandler::new(
        IdTokenHandleHelper::new(strategy.openid().clone()),
        config.min_parameter_entropy(),
    ))
}
