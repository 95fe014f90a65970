//! OAuth 2.0 grant, introspection and revocation handlers.

pub mod authorize_code;
pub mod client_credentials;
pub mod helper;
pub mod introspection;
pub mod refresh;
pub mod revocation;

pub use authorize_code::AuthorizeExplicitGrantHandler;
pub use client_credentials::ClientCredentialsGrantHandler;
pub use helper::{HandleHelper, get_expires_in};
pub use introspection::{CoreValidator, StatelessJwtValidator};
pub use refresh::RefreshTokenGrantHandler;
pub use revocation::TokenRevocationHandler;
