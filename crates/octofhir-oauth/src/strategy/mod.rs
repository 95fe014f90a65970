//! Pluggable strategies the provider delegates to.
//!
//! - [`scope`]: requested scope vs. client scopes
//! - [`audience`]: requested audience vs. client audiences
//! - [`hasher`]: client secret hashing
//! - [`jwks`]: remote key set fetching
//! - [`client_auth`]: client authentication
//! - [`response_mode`]: writing authorization responses

pub mod audience;
pub mod client_auth;
pub mod hasher;
pub mod jwks;
pub mod response_mode;
pub mod scope;

pub use audience::{
    AudienceMatchingStrategy, DefaultAudienceMatchingStrategy, ExactAudienceMatchingStrategy,
    audience_strategy,
};
pub use client_auth::{
    ClientAuthenticationStrategy, DefaultClientAuthenticationStrategy, JWT_BEARER_ASSERTION_TYPE,
};
pub use hasher::{Argon2Hasher, Hasher};
pub use jwks::{DefaultJwksFetcherStrategy, JwksError, JwksFetcherStrategy};
pub use response_mode::{
    DEFAULT_FORM_POST_TEMPLATE, DefaultResponseModeHandler, ResponseModeHandler, write_json,
    write_json_error,
};
pub use scope::{
    ExactScopeStrategy, HierarchicScopeStrategy, ScopeStrategy, WildcardScopeStrategy,
    scope_strategy,
};
