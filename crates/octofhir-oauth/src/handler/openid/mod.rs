//! OpenID Connect handlers and ID token strategy.

pub mod helper;
pub mod implicit;
pub mod strategy;

pub use helper::{IdTokenHandleHelper, access_token_hash};
pub use implicit::OpenIdConnectImplicitHandler;
pub use strategy::DefaultOpenIdStrategy;
