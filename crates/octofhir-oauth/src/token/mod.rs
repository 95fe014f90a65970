//! Token issuance and validation strategies.
//!
//! - [`hmac`]: opaque `random.signature` tokens with secret rotation
//! - [`opaque`]: core strategy issuing every kind as an HMAC token
//! - [`structured`]: core strategy issuing JWT access tokens
//! - [`jwt`]: key pairs, claims and the JWT signer
//! - [`strategy`]: the traits handlers depend on

pub mod hmac;
pub mod jwt;
pub mod opaque;
pub mod strategy;
pub mod structured;

pub use hmac::HmacStrategy;
pub use jwt::{
    AccessTokenClaims, IdTokenClaims, JwtError, JwtService, Jwk, Jwks, SigningAlgorithm,
    SigningKeyPair,
};
pub use opaque::HmacShaStrategy;
pub use strategy::{
    AccessTokenStrategy, AuthorizeCodeStrategy, CommonStrategy, CoreStrategy, JwtStrategy,
    Lifespans, OpenIdConnectTokenStrategy, RefreshTokenStrategy,
};
pub use structured::JwtAccessTokenStrategy;
