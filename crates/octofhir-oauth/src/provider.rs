//! The provider facade.
//!
//! [`Provider`] owns the four handler registries and the cross-cutting
//! strategies, and exposes the endpoint operations:
//!
//! - authorization endpoint: [`Provider::new_authorize_request`],
//!   [`Provider::new_authorize_response`], [`Provider::write_authorize_response`],
//!   [`Provider::write_authorize_error`]
//! - token endpoint: [`Provider::new_access_request`],
//!   [`Provider::new_access_response`], [`Provider::write_access_response`],
//!   [`Provider::write_access_error`]
//! - introspection: [`Provider::introspect_token`], [`Provider::new_introspection_request`]
//! - revocation: [`Provider::revoke_token`], [`Provider::new_revocation_request`]
//!
//! A provider is built once through [`ProviderBuilder`] and is immutable
//! afterwards; share it behind an `Arc`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};

use crate::config::ProviderConfig;
use crate::error::ErrorResponse;
use crate::handler::{
    AuthorizeEndpointHandler, AuthorizeEndpointHandlers, RevocationHandler, RevocationHandlers,
    TokenEndpointHandler, TokenEndpointHandlers, TokenIntrospectionHandlers, TokenIntrospector,
    TokenUse,
};
use crate::i18n::{MessageCatalog, localize_error, requested_locales};
use crate::storage::Storage;
use crate::strategy::{
    Argon2Hasher, AudienceMatchingStrategy, ClientAuthenticationStrategy,
    DefaultClientAuthenticationStrategy, DefaultJwksFetcherStrategy, DefaultResponseModeHandler,
    Hasher, JwksFetcherStrategy, ResponseModeHandler, ScopeStrategy, audience_strategy,
    scope_strategy, write_json, write_json_error,
};
use crate::types::{
    AccessRequest, AccessResponse, Arguments, AuthorizeRequest, AuthorizeResponse, Client,
    HttpRequest, HttpResponse, IntrospectionResponse, Request, Session,
};
use crate::{OAuthError, OAuthResult};

/// Parses and validates raw authorization requests.
#[async_trait]
pub trait AuthorizeRequestParser: Send + Sync {
    /// Turns a transport request into a validated [`AuthorizeRequest`].
    async fn parse_authorize_request(&self, request: &HttpRequest)
    -> OAuthResult<AuthorizeRequest>;
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`Provider`].
///
/// Strategies that are not set explicitly are derived from the configuration
/// on [`ProviderBuilder::build`].
pub struct ProviderBuilder {
    config: ProviderConfig,
    storage: Option<Arc<dyn Storage>>,
    hasher: Option<Arc<dyn Hasher>>,
    scope_strategy: Option<Arc<dyn ScopeStrategy>>,
    audience_strategy: Option<Arc<dyn AudienceMatchingStrategy>>,
    jwks_fetcher: Option<Arc<dyn JwksFetcherStrategy>>,
    client_authentication: Option<Arc<dyn ClientAuthenticationStrategy>>,
    response_mode_extension: Option<Arc<dyn ResponseModeHandler>>,
    message_catalog: Option<Arc<dyn MessageCatalog>>,
    authorize_request_parser: Option<Arc<dyn AuthorizeRequestParser>>,
    authorize_endpoint_handlers: AuthorizeEndpointHandlers,
    token_endpoint_handlers: TokenEndpointHandlers,
    token_introspection_handlers: TokenIntrospectionHandlers,
    revocation_handlers: RevocationHandlers,
}

impl std::fmt::Debug for ProviderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBuilder")
            .field("authorize_endpoint_handlers", &self.authorize_endpoint_handlers)
            .field("token_endpoint_handlers", &self.token_endpoint_handlers)
            .field("token_introspection_handlers", &self.token_introspection_handlers)
            .field("revocation_handlers", &self.revocation_handlers)
            .finish_non_exhaustive()
    }
}

impl ProviderBuilder {
    /// Starts a builder with empty registries.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            storage: None,
            hasher: None,
            scope_strategy: None,
            audience_strategy: None,
            jwks_fetcher: None,
            client_authentication: None,
            response_mode_extension: None,
            message_catalog: None,
            authorize_request_parser: None,
            authorize_endpoint_handlers: AuthorizeEndpointHandlers::new(),
            token_endpoint_handlers: TokenEndpointHandlers::new(),
            token_introspection_handlers: TokenIntrospectionHandlers::new(),
            revocation_handlers: RevocationHandlers::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Sets the storage backend.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the client secret hasher. Defaults to Argon2id.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn Hasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Overrides the configured scope strategy.
    #[must_use]
    pub fn with_scope_strategy(mut self, strategy: Arc<dyn ScopeStrategy>) -> Self {
        self.scope_strategy = Some(strategy);
        self
    }

    /// Overrides the configured audience strategy.
    #[must_use]
    pub fn with_audience_strategy(mut self, strategy: Arc<dyn AudienceMatchingStrategy>) -> Self {
        self.audience_strategy = Some(strategy);
        self
    }

    /// Sets the JWKS fetcher.
    #[must_use]
    pub fn with_jwks_fetcher(mut self, fetcher: Arc<dyn JwksFetcherStrategy>) -> Self {
        self.jwks_fetcher = Some(fetcher);
        self
    }

    /// Replaces the default client authentication.
    #[must_use]
    pub fn with_client_authentication_strategy(
        mut self,
        strategy: Arc<dyn ClientAuthenticationStrategy>,
    ) -> Self {
        self.client_authentication = Some(strategy);
        self
    }

    /// Adds a writer for custom response modes.
    #[must_use]
    pub fn with_response_mode_handler(mut self, handler: Arc<dyn ResponseModeHandler>) -> Self {
        self.response_mode_extension = Some(handler);
        self
    }

    /// Sets the catalog used to localise error descriptions.
    #[must_use]
    pub fn with_message_catalog(mut self, catalog: Arc<dyn MessageCatalog>) -> Self {
        self.message_catalog = Some(catalog);
        self
    }

    /// Sets the authorization request parser.
    #[must_use]
    pub fn with_authorize_request_parser(
        mut self,
        parser: Arc<dyn AuthorizeRequestParser>,
    ) -> Self {
        self.authorize_request_parser = Some(parser);
        self
    }

    /// Registers an authorization endpoint handler. Returns `false` if a
    /// handler of the same kind is already registered.
    pub fn append_authorize_endpoint_handler(
        &mut self,
        handler: Arc<dyn AuthorizeEndpointHandler>,
    ) -> bool {
        self.authorize_endpoint_handlers.append(handler)
    }

    /// Registers a token endpoint handler.
    pub fn append_token_endpoint_handler(
        &mut self,
        handler: Arc<dyn TokenEndpointHandler>,
    ) -> bool {
        self.token_endpoint_handlers.append(handler)
    }

    /// Registers a token introspector.
    pub fn append_token_introspection_handler(
        &mut self,
        handler: Arc<dyn TokenIntrospector>,
    ) -> bool {
        self.token_introspection_handlers.append(handler)
    }

    /// Registers a revocation handler.
    pub fn append_revocation_handler(&mut self, handler: Arc<dyn RevocationHandler>) -> bool {
        self.revocation_handlers.append(handler)
    }

    /// Freezes the registries and builds the provider.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the configuration is invalid, or if neither
    /// a client authentication strategy nor a storage backend was set.
    pub fn build(self) -> OAuthResult<Provider> {
        self.config.validate().map_err(|e| {
            OAuthError::server_error()
                .with_hint("The provider configuration is invalid.")
                .with_debug(e.to_string())
        })?;

        let hasher = self
            .hasher
            .unwrap_or_else(|| Arc::new(Argon2Hasher::new()) as Arc<dyn Hasher>);
        let jwks_fetcher = self.jwks_fetcher.unwrap_or_else(|| {
            Arc::new(DefaultJwksFetcherStrategy::new(self.config.jwks.clone()))
                as Arc<dyn JwksFetcherStrategy>
        });

        let client_authentication: Arc<dyn ClientAuthenticationStrategy> =
            match (self.client_authentication, &self.storage) {
                (Some(strategy), _) => strategy,
                (None, Some(storage)) => Arc::new(DefaultClientAuthenticationStrategy::new(
                    storage.clone(),
                    hasher.clone(),
                    jwks_fetcher.clone(),
                    self.config.token_url.clone(),
                )),
                (None, None) => {
                    return Err(OAuthError::server_error().with_debug(
                        "A storage backend or a client authentication strategy is required.",
                    ));
                }
            };

        let mut default_response_mode = DefaultResponseModeHandler::new().with_error_format(
            self.config.send_debug_messages_to_clients,
            self.config.use_legacy_error_format,
        );
        if let Some(template) = &self.config.form_post_html_template {
            default_response_mode = default_response_mode.with_form_post_template(template);
        }

        tracing::debug!(
            authorize = ?self.authorize_endpoint_handlers.kinds(),
            token = ?self.token_endpoint_handlers.kinds(),
            introspection = ?self.token_introspection_handlers.kinds(),
            revocation = ?self.revocation_handlers.kinds(),
            "OAuth provider built"
        );

        Ok(Provider {
            scope_strategy: self
                .scope_strategy
                .unwrap_or_else(|| scope_strategy(self.config.scope_strategy)),
            audience_strategy: self
                .audience_strategy
                .unwrap_or_else(|| audience_strategy(self.config.audience_strategy)),
            min_parameter_entropy: self.config.min_parameter_entropy(),
            config: self.config,
            storage: self.storage,
            hasher,
            jwks_fetcher,
            client_authentication,
            default_response_mode,
            response_mode_extension: self.response_mode_extension,
            message_catalog: self.message_catalog,
            authorize_request_parser: self.authorize_request_parser,
            authorize_endpoint_handlers: self.authorize_endpoint_handlers,
            token_endpoint_handlers: self.token_endpoint_handlers,
            token_introspection_handlers: self.token_introspection_handlers,
            revocation_handlers: self.revocation_handlers,
        })
    }
}

// =============================================================================
// Provider
// =============================================================================

/// OAuth 2.0 and OpenID Connect provider.
pub struct Provider {
    config: ProviderConfig,
    storage: Option<Arc<dyn Storage>>,
    hasher: Arc<dyn Hasher>,
    scope_strategy: Arc<dyn ScopeStrategy>,
    audience_strategy: Arc<dyn AudienceMatchingStrategy>,
    jwks_fetcher: Arc<dyn JwksFetcherStrategy>,
    client_authentication: Arc<dyn ClientAuthenticationStrategy>,
    default_response_mode: DefaultResponseModeHandler,
    response_mode_extension: Option<Arc<dyn ResponseModeHandler>>,
    message_catalog: Option<Arc<dyn MessageCatalog>>,
    authorize_request_parser: Option<Arc<dyn AuthorizeRequestParser>>,
    min_parameter_entropy: usize,
    authorize_endpoint_handlers: AuthorizeEndpointHandlers,
    token_endpoint_handlers: TokenEndpointHandlers,
    token_introspection_handlers: TokenIntrospectionHandlers,
    revocation_handlers: RevocationHandlers,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("authorize_endpoint_handlers", &self.authorize_endpoint_handlers)
            .field("token_endpoint_handlers", &self.token_endpoint_handlers)
            .field("token_introspection_handlers", &self.token_introspection_handlers)
            .field("revocation_handlers", &self.revocation_handlers)
            .finish_non_exhaustive()
    }
}

impl Provider {
    /// Starts a builder.
    #[must_use]
    pub fn builder(config: ProviderConfig) -> ProviderBuilder {
        ProviderBuilder::new(config)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The configuration the provider was built from.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Registered authorization endpoint handlers.
    #[must_use]
    pub fn authorize_endpoint_handlers(&self) -> &AuthorizeEndpointHandlers {
        &self.authorize_endpoint_handlers
    }

    /// Registered token endpoint handlers.
    #[must_use]
    pub fn token_endpoint_handlers(&self) -> &TokenEndpointHandlers {
        &self.token_endpoint_handlers
    }

    /// Registered token introspectors.
    #[must_use]
    pub fn token_introspection_handlers(&self) -> &TokenIntrospectionHandlers {
        &self.token_introspection_handlers
    }

    /// Registered revocation handlers.
    #[must_use]
    pub fn revocation_handlers(&self) -> &RevocationHandlers {
        &self.revocation_handlers
    }

    /// Client secret hasher.
    #[must_use]
    pub fn hasher(&self) -> &Arc<dyn Hasher> {
        &self.hasher
    }

    /// Scope strategy.
    #[must_use]
    pub fn scope_strategy(&self) -> &Arc<dyn ScopeStrategy> {
        &self.scope_strategy
    }

    /// Audience strategy.
    #[must_use]
    pub fn audience_strategy(&self) -> &Arc<dyn AudienceMatchingStrategy> {
        &self.audience_strategy
    }

    /// JWKS fetcher.
    #[must_use]
    pub fn jwks_fetcher(&self) -> &Arc<dyn JwksFetcherStrategy> {
        &self.jwks_fetcher
    }

    /// Minimum length of `state` and `nonce`.
    #[must_use]
    pub fn min_parameter_entropy(&self) -> usize {
        self.min_parameter_entropy
    }

    // -------------------------------------------------------------------------
    // Authorization endpoint
    // -------------------------------------------------------------------------

    /// Parses and validates an authorization request.
    ///
    /// # Errors
    ///
    /// Returns `not_implemented` unless an [`AuthorizeRequestParser`] is set,
    /// otherwise whatever the parser returns.
    pub async fn new_authorize_request(
        &self,
        request: &HttpRequest,
    ) -> OAuthResult<AuthorizeRequest> {
        let Some(parser) = &self.authorize_request_parser else {
            return Err(OAuthError::not_implemented()
                .with_hint("No authorization request parser is configured."));
        };
        parser.parse_authorize_request(request).await
    }

    /// Runs every authorization handler that claims the request.
    ///
    /// # Errors
    ///
    /// - `no_applicable_handler` if no handler claimed the request
    /// - `unsupported_response_type` if a response type was left unhandled
    /// - the first error a claiming handler returns
    pub async fn new_authorize_response(
        &self,
        request: &mut AuthorizeRequest,
        session: Session,
    ) -> OAuthResult<AuthorizeResponse> {
        request.request.session = session;
        let mut response = AuthorizeResponse::new();

        let mut claimed = false;
        for handler in &self.authorize_endpoint_handlers {
            if !handler.can_handle_authorize_endpoint_request(request) {
                continue;
            }
            claimed = true;
            tracing::debug!(
                handler = %handler.kind(),
                request_id = %request.request.id,
                "Authorize handler claimed request"
            );
            match handler
                .handle_authorize_endpoint_request(request, &mut response)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_unknown_request() => {}
                Err(e) => return Err(e),
            }
        }

        if !claimed {
            return Err(OAuthError::no_applicable_handler().with_hint(format!(
                "No handler accepts response type '{}'.",
                request.response_types.to_space_delimited()
            )));
        }

        if !request.did_handle_all_response_types() {
            return Err(OAuthError::unsupported_response_type().with_hint(format!(
                "The client is not allowed to request response type '{}'.",
                request.response_types.to_space_delimited()
            )));
        }

        Ok(response)
    }

    /// Writes a successful authorization response.
    #[must_use]
    pub fn write_authorize_response(
        &self,
        request: &AuthorizeRequest,
        response: &AuthorizeResponse,
    ) -> HttpResponse {
        self.response_mode_handler(request)
            .write_authorize_response(request, response)
    }

    /// Writes an authorization error, localised when a catalog is set.
    #[must_use]
    pub fn write_authorize_error(
        &self,
        request: &AuthorizeRequest,
        error: &OAuthError,
    ) -> HttpResponse {
        let error = self.localize(error, &request.request.form, &HeaderMap::new());
        self.response_mode_handler(request)
            .write_authorize_error(request, &error)
    }

    fn response_mode_handler(&self, request: &AuthorizeRequest) -> &dyn ResponseModeHandler {
        let mode = request.effective_response_mode();
        match &self.response_mode_extension {
            Some(extension) if extension.response_modes().contains(&mode) => extension.as_ref(),
            _ => &self.default_response_mode,
        }
    }

    // -------------------------------------------------------------------------
    // Token endpoint
    // -------------------------------------------------------------------------

    /// Builds and validates a token request.
    ///
    /// The first token handler claiming the request processes it. The client
    /// is authenticated first unless that handler allows skipping it.
    ///
    /// # Errors
    ///
    /// - `invalid_request` for a non-POST request or a missing `grant_type`
    /// - `no_applicable_handler` if no token handler is registered
    /// - `unsupported_grant_type` if no handler claims the grant type
    /// - client authentication and handler errors
    pub async fn new_access_request(
        &self,
        http_request: &HttpRequest,
        session: Session,
    ) -> OAuthResult<AccessRequest> {
        if http_request.method != Method::POST {
            return Err(OAuthError::invalid_request().with_hint(format!(
                "HTTP method is '{}', expected 'POST'.",
                http_request.method
            )));
        }

        let form = &http_request.form;
        let Some(grant_type) = form.get("grant_type").filter(|g| !g.is_empty()) else {
            return Err(OAuthError::invalid_request()
                .with_hint("Request parameter 'grant_type' is missing."));
        };

        let mut request = Request::new(Client::default()).with_session(session);
        request.form = form.clone();
        request.requested_scopes =
            Arguments::from_space_delimited(form.get("scope").unwrap_or_default());
        request.requested_audience = form
            .get_all("audience")
            .iter()
            .flat_map(|a| a.split_whitespace())
            .collect();

        let mut access_request = AccessRequest::new(request)
            .with_grant_types(grant_type.split_whitespace());

        if self.token_endpoint_handlers.is_empty() {
            return Err(OAuthError::no_applicable_handler()
                .with_hint("No token endpoint handler is registered."));
        }
        let Some(handler) = self
            .token_endpoint_handlers
            .first_match(|h| h.can_handle_token_endpoint_request(&access_request))
            .cloned()
        else {
            return Err(OAuthError::unsupported_grant_type().with_hint(format!(
                "The OAuth 2.0 Client is not allowed to use grant type '{grant_type}'."
            )));
        };

        if handler.can_skip_client_auth(&access_request) {
            access_request.request.client = self.lookup_client(form.get("client_id")).await?;
        } else {
            access_request.request.client = self
                .client_authentication
                .authenticate_client(http_request)
                .await?;
        }

        tracing::debug!(
            handler = %handler.kind(),
            client_id = %access_request.request.client.id,
            "Token handler claimed request"
        );
        handler
            .handle_token_endpoint_request(&mut access_request)
            .await?;
        Ok(access_request)
    }

    /// Runs response population on the handler that claimed the request.
    ///
    /// # Errors
    ///
    /// Handler errors, or `server_error` if the handler left the access token
    /// or token type empty.
    pub async fn new_access_response(
        &self,
        access_request: &AccessRequest,
    ) -> OAuthResult<AccessResponse> {
        let Some(handler) = self
            .token_endpoint_handlers
            .first_match(|h| h.can_handle_token_endpoint_request(access_request))
        else {
            return Err(OAuthError::no_applicable_handler()
                .with_hint("No token endpoint handler accepts this request."));
        };

        let mut response = AccessResponse::new();
        handler
            .populate_token_endpoint_response(access_request, &mut response)
            .await?;

        if response.access_token().is_empty() || response.token_type().is_empty() {
            return Err(OAuthError::server_error()
                .with_hint(
                    "An internal server error occurred while trying to complete the request.",
                )
                .with_debug(format!(
                    "Handler '{}' did not set an access token and token type.",
                    handler.kind()
                )));
        }
        Ok(response)
    }

    /// Writes a token response.
    #[must_use]
    pub fn write_access_response(&self, response: &AccessResponse) -> HttpResponse {
        write_json(&response.to_json())
    }

    /// Writes a token endpoint error, localised when a catalog is set.
    #[must_use]
    pub fn write_access_error(&self, request: &HttpRequest, error: &OAuthError) -> HttpResponse {
        let error = self.localize(error, &request.form, &request.headers);
        write_json_error(
            &error,
            self.config.send_debug_messages_to_clients,
            self.config.use_legacy_error_format,
        )
    }

    /// Serialises an error with the provider's wire format settings.
    #[must_use]
    pub fn error_response(&self, error: &OAuthError) -> ErrorResponse {
        error.to_response(
            self.config.send_debug_messages_to_clients,
            self.config.use_legacy_error_format,
        )
    }

    async fn lookup_client(&self, client_id: Option<&str>) -> OAuthResult<Client> {
        let (Some(storage), Some(client_id)) = (&self.storage, client_id) else {
            return Ok(Client::default());
        };
        storage.get_client(client_id).await?.ok_or_else(|| {
            OAuthError::invalid_client().with_hint("The requested OAuth 2.0 Client does not exist.")
        })
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Validates a token through the introspection handlers.
    ///
    /// Handlers answering `unknown_request` are skipped; the first success
    /// wins. `scopes` must all be granted to the token.
    ///
    /// # Errors
    ///
    /// The first non-fallthrough handler error, or `request_unauthorized`
    /// when no handler recognised the token.
    pub async fn introspect_token(
        &self,
        token: &str,
        token_use: TokenUse,
        session: Session,
        scopes: &[String],
    ) -> OAuthResult<(TokenUse, AccessRequest)> {
        let mut access_request =
            AccessRequest::new(Request::new(Client::default()).with_session(session));

        for handler in &self.token_introspection_handlers {
            match handler
                .introspect_token(token, token_use, &mut access_request, scopes)
                .await
            {
                Ok(found) => {
                    tracing::trace!(
                        handler = %handler.kind(),
                        token_use = %found,
                        "Token introspected"
                    );
                    return Ok((found, access_request));
                }
                Err(e) if e.is_unknown_request() => {}
                Err(e) => return Err(e),
            }
        }

        Err(OAuthError::request_unauthorized().with_hint(
            "Unable to find a suitable validation strategy for the token, thus it is invalid.",
        ))
    }

    /// Handles an RFC 7662 introspection request.
    ///
    /// The caller authenticates either with a bearer access token or with
    /// client credentials. Tokens that fail validation yield an inactive
    /// response rather than an error.
    ///
    /// # Errors
    ///
    /// `invalid_request` for malformed requests and `request_unauthorized` /
    /// `invalid_client` when the caller cannot be authenticated.
    pub async fn new_introspection_request(
        &self,
        http_request: &HttpRequest,
        session: Session,
    ) -> OAuthResult<IntrospectionResponse> {
        if http_request.method != Method::POST {
            return Err(OAuthError::invalid_request().with_hint(format!(
                "HTTP method is '{}' but expected 'POST'.",
                http_request.method
            )));
        }

        let form = &http_request.form;
        let Some(token) = form.get("token").filter(|t| !t.is_empty()) else {
            return Err(OAuthError::invalid_request()
                .with_hint("The POST body can not be empty."));
        };
        let token_use = form
            .get("token_type_hint")
            .and_then(TokenUse::parse)
            .unwrap_or_default();
        let scopes: Vec<String> = form
            .get("scope")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        if let Some(bearer) = bearer_token(&http_request.headers) {
            let (used, _) = self
                .introspect_token(bearer, TokenUse::AccessToken, Session::new(), &[])
                .await
                .map_err(|e| {
                    OAuthError::request_unauthorized()
                        .with_hint(
                            "HTTP Authorization header missing, malformed, or credentials used are invalid.",
                        )
                        .with_debug(e.to_string())
                })?;
            if used != TokenUse::AccessToken {
                return Err(OAuthError::request_unauthorized().with_hint(
                    "HTTP Authorization header did not provide a token of type 'access_token'.",
                ));
            }
        } else {
            self.client_authentication
                .authenticate_client(http_request)
                .await?;
        }

        match self.introspect_token(token, token_use, session, &scopes).await {
            Ok((found, access_request)) => Ok(IntrospectionResponse {
                active: true,
                access_request: Some(access_request),
                token_use: Some(found),
            }),
            Err(e) => {
                tracing::debug!(error = %e, "Introspected token is inactive");
                Ok(IntrospectionResponse::inactive())
            }
        }
    }

    /// Writes an introspection response.
    #[must_use]
    pub fn write_introspection_response(&self, response: &IntrospectionResponse) -> HttpResponse {
        write_json(&response.to_json())
    }

    // -------------------------------------------------------------------------
    // Revocation
    // -------------------------------------------------------------------------

    /// Revokes a token through the revocation handlers.
    ///
    /// # Errors
    ///
    /// The first non-fallthrough handler error, or `no_applicable_handler`
    /// when no handler took the token.
    pub async fn revoke_token(
        &self,
        token: &str,
        hint: Option<TokenUse>,
        client: &Client,
    ) -> OAuthResult<()> {
        for handler in &self.revocation_handlers {
            match handler.revoke_token(token, hint, client).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unknown_request() => {}
                Err(e) => return Err(e),
            }
        }
        Err(OAuthError::no_applicable_handler()
            .with_hint("No revocation handler accepted the token."))
    }

    /// Handles an RFC 7009 revocation request from an authenticated client.
    ///
    /// # Errors
    ///
    /// `invalid_request` for malformed requests, client authentication
    /// errors and handler errors.
    pub async fn new_revocation_request(&self, http_request: &HttpRequest) -> OAuthResult<()> {
        if http_request.method != Method::POST {
            return Err(OAuthError::invalid_request().with_hint(format!(
                "HTTP method is '{}' but expected 'POST'.",
                http_request.method
            )));
        }

        let client = self
            .client_authentication
            .authenticate_client(http_request)
            .await?;

        let form = &http_request.form;
        let Some(token) = form.get("token").filter(|t| !t.is_empty()) else {
            return Err(OAuthError::invalid_request()
                .with_hint("Parameter 'token' is missing."));
        };
        let hint = form.get("token_type_hint").and_then(TokenUse::parse);

        self.revoke_token(token, hint, &client).await
    }

    /// Writes the outcome of a revocation request.
    #[must_use]
    pub fn write_revocation_response(
        &self,
        request: &HttpRequest,
        result: &OAuthResult<()>,
    ) -> HttpResponse {
        match result {
            Ok(()) => write_json(&serde_json::json!({})),
            Err(e) => self.write_access_error(request, e),
        }
    }

    fn localize(
        &self,
        error: &OAuthError,
        form: &crate::types::Form,
        headers: &HeaderMap,
    ) -> OAuthError {
        match &self.message_catalog {
            Some(catalog) => {
                localize_error(catalog.as_ref(), error, &requested_locales(form, headers))
            }
            None => error.clone(),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::handler::{Handler, HandlerKind};
    use crate::i18n::DefaultMessageCatalog;
    use crate::storage::MemoryStore;
    use crate::types::{Form, ResponseMode};
    use axum::http::StatusCode;

    struct FixedClient;

    #[async_trait]
    impl ClientAuthenticationStrategy for FixedClient {
        async fn authenticate_client(&self, _request: &HttpRequest) -> OAuthResult<Client> {
            Ok(Client::confidential("svc", "hash").with_grant_types(["test_grant"]))
        }
    }

    /// Claims `test_grant` and issues a fixed token.
    struct TestGrant {
        skip_client_auth: bool,
    }

    impl Handler for TestGrant {
        fn kind(&self) -> HandlerKind {
            HandlerKind("test_grant")
        }
    }

    #[async_trait]
    impl TokenEndpointHandler for TestGrant {
        fn can_handle_token_endpoint_request(&self, request: &AccessRequest) -> bool {
            request.grant_types.exact_one("test_grant")
        }

        fn can_skip_client_auth(&self, _request: &AccessRequest) -> bool {
            self.skip_client_auth
        }

        async fn handle_token_endpoint_request(
            &self,
            request: &mut AccessRequest,
        ) -> OAuthResult<()> {
            request.handled_grant_types.append("test_grant");
            Ok(())
        }

        async fn populate_token_endpoint_response(
            &self,
            _request: &AccessRequest,
            response: &mut AccessResponse,
        ) -> OAuthResult<()> {
            response.set_access_token("token-value");
            response.set_token_type("bearer");
            Ok(())
        }
    }

    /// Claims `code` but never marks it handled.
    struct LazyAuthorize;

    impl Handler for LazyAuthorize {
        fn kind(&self) -> HandlerKind {
            HandlerKind("lazy")
        }
    }

    #[async_trait]
    impl AuthorizeEndpointHandler for LazyAuthorize {
        fn can_handle_authorize_endpoint_request(&self, request: &AuthorizeRequest) -> bool {
            request.response_types.has("code")
        }

        async fn handle_authorize_endpoint_request(
            &self,
            _request: &mut AuthorizeRequest,
            _response: &mut AuthorizeResponse,
        ) -> OAuthResult<()> {
            Ok(())
        }
    }

    struct CustomMode;

    impl ResponseModeHandler for CustomMode {
        fn response_modes(&self) -> &[ResponseMode] {
            &[ResponseMode::FormPost]
        }

        fn write_authorize_response(
            &self,
            _request: &AuthorizeRequest,
            _response: &AuthorizeResponse,
        ) -> HttpResponse {
            let mut response = HttpResponse::new(axum::body::Body::empty());
            *response.status_mut() = StatusCode::ACCEPTED;
            response
        }

        fn write_authorize_error(
            &self,
            request: &AuthorizeRequest,
            _error: &OAuthError,
        ) -> HttpResponse {
            self.write_authorize_response(request, &AuthorizeResponse::new())
        }
    }

    fn provider_with(skip_client_auth: bool) -> Provider {
        let mut builder = Provider::builder(ProviderConfig::default())
            .with_client_authentication_strategy(Arc::new(FixedClient));
        builder.append_token_endpoint_handler(Arc::new(TestGrant { skip_client_auth }));
        builder.append_authorize_endpoint_handler(Arc::new(LazyAuthorize));
        builder.build().unwrap()
    }

    fn token_request(grant_type: &str) -> HttpRequest {
        let mut form = Form::new();
        form.set("grant_type", grant_type);
        form.set("scope", "read write");
        HttpRequest::post(form)
    }

    #[tokio::test]
    async fn test_access_request_and_response() {
        let provider = provider_with(false);
        let ar = provider
            .new_access_request(&token_request("test_grant"), Session::new())
            .await
            .unwrap();
        assert_eq!(ar.request.client.id, "svc");
        assert!(ar.request.requested_scopes.has_all(&["read", "write"]));
        assert!(ar.handled_grant_types.has("test_grant"));

        let response = provider.new_access_response(&ar).await.unwrap();
        assert_eq!(response.access_token(), "token-value");

        let http = provider.write_access_response(&response);
        assert_eq!(http.status(), StatusCode::OK);
        assert_eq!(http.headers()[axum::http::header::CACHE_CONTROL], "no-store");
    }

    #[tokio::test]
    async fn test_access_request_validation() {
        let provider = provider_with(false);

        let err = provider
            .new_access_request(&HttpRequest::get(Form::new()), Session::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = provider
            .new_access_request(&HttpRequest::post(Form::new()), Session::new())
            .await
            .unwrap_err();
        assert!(err.hint().unwrap().contains("grant_type"));

        let err = provider
            .new_access_request(&token_request("password"), Session::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedGrantType);
    }

    #[tokio::test]
    async fn test_skip_client_auth_looks_up_client() {
        let store = Arc::new(MemoryStore::new().with_client(Client::public("spa")));
        let mut builder = Provider::builder(ProviderConfig::default())
            .with_storage(store)
            .with_client_authentication_strategy(Arc::new(FixedClient));
        builder.append_token_endpoint_handler(Arc::new(TestGrant {
            skip_client_auth: true,
        }));
        let provider = builder.build().unwrap();

        let mut request = token_request("test_grant");
        request.form.set("client_id", "spa");
        let ar = provider
            .new_access_request(&request, Session::new())
            .await
            .unwrap();
        assert_eq!(ar.request.client.id, "spa");
    }

    #[tokio::test]
    async fn test_empty_token_registry() {
        let provider = Provider::builder(ProviderConfig::default())
            .with_client_authentication_strategy(Arc::new(FixedClient))
            .build()
            .unwrap();
        let err = provider
            .new_access_request(&token_request("test_grant"), Session::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoApplicableHandler);
    }

    #[tokio::test]
    async fn test_authorize_dispatch_errors() {
        let provider = provider_with(false);

        let mut ar = AuthorizeRequest::new(Request::new(Client::public("spa")));
        ar.response_types.append("token");
        let err = provider
            .new_authorize_response(&mut ar, Session::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoApplicableHandler);

        let mut ar = AuthorizeRequest::new(Request::new(Client::public("spa")));
        ar.response_types.append("code");
        let err = provider
            .new_authorize_response(&mut ar, Session::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedResponseType);
    }

    #[tokio::test]
    async fn test_new_authorize_request_not_implemented() {
        let provider = provider_with(false);
        let err = provider
            .new_authorize_request(&HttpRequest::get(Form::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[test]
    fn test_response_mode_extension_routing() {
        let mut builder = Provider::builder(ProviderConfig::default())
            .with_client_authentication_strategy(Arc::new(FixedClient))
            .with_response_mode_handler(Arc::new(CustomMode));
        builder.append_authorize_endpoint_handler(Arc::new(LazyAuthorize));
        let provider = builder.build().unwrap();

        let mut ar = AuthorizeRequest::new(Request::new(Client::public("spa")));
        ar.redirect_uri = Some(url::Url::parse("https://spa.example.com/cb").unwrap());

        ar.response_mode = ResponseMode::FormPost;
        let resp = provider.write_authorize_response(&ar, &AuthorizeResponse::new());
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        ar.response_mode = ResponseMode::Query;
        let resp = provider.write_authorize_response(&ar, &AuthorizeResponse::new());
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_access_error_is_localized() {
        let catalog = DefaultMessageCatalog::new().with_message(
            "de",
            "invalid_grant",
            "Die Berechtigung ist ungültig.",
        );
        let provider = Provider::builder(ProviderConfig::default())
            .with_client_authentication_strategy(Arc::new(FixedClient))
            .with_message_catalog(Arc::new(catalog))
            .build()
            .unwrap();

        let request = HttpRequest::post(Form::new()).with_header("accept-language", "de-DE");
        let resp = provider.write_access_error(&request, &OAuthError::invalid_grant());
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error_description"], "Die Berechtigung ist ungültig.");
    }

    #[test]
    fn test_error_response_respects_flags() {
        let config = ProviderConfig {
            send_debug_messages_to_clients: true,
            use_legacy_error_format: true,
            ..Default::default()
        };
        let provider = Provider::builder(config)
            .with_client_authentication_strategy(Arc::new(FixedClient))
            .build()
            .unwrap();

        let wire = provider.error_response(&OAuthError::invalid_grant().with_debug("detail"));
        assert_eq!(wire.error_debug.as_deref(), Some("detail"));
        assert_eq!(wire.status_code, Some(400));
    }

    #[test]
    fn test_build_requires_client_authentication() {
        let err = Provider::builder(ProviderConfig::default()).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerError);
    }

    #[tokio::test]
    async fn test_empty_registries_reject_tokens() {
        let provider = provider_with(false);
        let err = provider
            .introspect_token("anything", TokenUse::AccessToken, Session::new(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RequestUnauthorized);

        let err = provider
            .revoke_token("anything", None, &Client::public("spa"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoApplicableHandler);
    }
}
