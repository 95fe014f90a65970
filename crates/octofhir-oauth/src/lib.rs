//! # octofhir-oauth
//!
//! Extensible OAuth 2.0 and OpenID Connect provider engine.
//!
//! The crate does not serve HTTP itself. A host server passes each incoming
//! request to the [`Provider`], which routes it through registered handlers
//! and writes the protocol response.
//!
//! ## Overview
//!
//! Every grant or response type is a handler. Handlers declare which of the
//! four endpoint roles they serve (authorization, token, introspection and
//! revocation) and the provider dispatches to them per endpoint. Token
//! formats, storage, client authentication and response rendering are
//! pluggable strategies.
//!
//! ## Modules
//!
//! - [`config`] - Provider configuration
//! - [`error`] - Protocol errors and their wire format
//! - [`types`] - Requests, responses, clients and sessions
//! - [`storage`] - Persistence traits and the in-memory store
//! - [`token`] - Token issuance and validation strategies
//! - [`strategy`] - Scope, audience, hashing, key fetching, client
//!   authentication and response mode strategies
//! - [`handler`] - Endpoint handler roles and the built-in handlers
//! - [`provider`] - The request router
//! - [`compose`] - Building a provider from handler factories
//! - [`i18n`] - Localized error descriptions

pub mod compose;
pub mod config;
pub mod error;
pub mod handler;
pub mod i18n;
pub mod provider;
pub mod storage;
pub mod strategy;
pub mod token;
pub mod types;

pub use compose::{Capabilities, Factory, compose, compose_all_enabled};
pub use config::{ConfigError, ProviderConfig};
pub use error::{ErrorCategory, ErrorKind, ErrorResponse, OAuthError};
pub use handler::{
    AuthorizeEndpointHandler, Handler, HandlerKind, RevocationHandler, TokenEndpointHandler,
    TokenIntrospector, TokenUse,
};
pub use provider::{AuthorizeRequestParser, Provider, ProviderBuilder};
pub use storage::{MemoryStore, Storage};
pub use types::{
    AccessRequest, AccessResponse, Arguments, AuthorizeRequest, AuthorizeResponse, Client, Form,
    HttpRequest, HttpResponse, IntrospectionResponse, Request, Session,
};

/// Result type used throughout the crate.
pub type OAuthResult<T> = Result<T, OAuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use octofhir_oauth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::OAuthResult;
    pub use crate::compose::{
        Capabilities, Factory, compose, compose_all_enabled, new_oauth2_hmac_strategy,
        new_oauth2_jwt_strategy, new_openid_connect_strategy,
    };
    pub use crate::config::{ConfigError, ProviderConfig};
    pub use crate::error::{ErrorCategory, ErrorKind, ErrorResponse, OAuthError};
    pub use crate::handler::{
        AuthorizeEndpointHandler, Handler, HandlerKind, RevocationHandler, TokenEndpointHandler,
        TokenIntrospector, TokenUse,
    };
    pub use crate::i18n::{DefaultMessageCatalog, MessageCatalog};
    pub use crate::provider::{AuthorizeRequestParser, Provider, ProviderBuilder};
    pub use crate::storage::{MemoryStore, Storage};
    pub use crate::strategy::{
        ClientAuthenticationStrategy, Hasher, ResponseModeHandler, ScopeStrategy,
    };
    pub use crate::token::{CommonStrategy, SigningAlgorithm, SigningKeyPair};
    pub use crate::types::{
        AccessRequest, AccessResponse, Arguments, AuthorizeRequest, AuthorizeResponse, Client,
        Form, HttpRequest, HttpResponse, IntrospectionResponse, Request, ResponseMode, Session,
        TokenKind,
    };
}
