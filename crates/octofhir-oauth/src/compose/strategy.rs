//! Constructors for the default token strategies.

use std::sync::Arc;

use crate::OAuthResult;
use crate::config::ProviderConfig;
use crate::handler::openid::DefaultOpenIdStrategy;
use crate::token::{
    HmacShaStrategy, HmacStrategy, JwtAccessTokenStrategy, JwtService, Lifespans, SigningKeyPair,
};
use crate::types::TokenKind;

/// Builds the opaque core strategy.
///
/// `secret` signs new tokens; `rotated_secrets` are still accepted when
/// validating, in order.
///
/// # Errors
///
/// Returns an error if any secret is shorter than 32 bytes.
pub fn new_oauth2_hmac_strategy<S: AsRef<[u8]>>(
    config: &ProviderConfig,
    secret: &[u8],
    rotated_secrets: &[S],
) -> OAuthResult<Arc<HmacShaStrategy>> {
    let hmac = HmacStrategy::new(secret.to_vec())?
        .with_rotated_secrets(rotated_secrets.iter().map(|s| s.as_ref().to_vec()))?
        .with_entropy(config.token_entropy);
    Ok(Arc::new(HmacShaStrategy::new(hmac, Lifespans::from_config(config))))
}

/// Builds the core strategy issuing JWT access tokens.
///
/// Refresh tokens and authorization codes stay opaque and come from `hmac`.
#[must_use]
pub fn new_oauth2_jwt_strategy(
    config: &ProviderConfig,
    key: SigningKeyPair,
    hmac: Arc<HmacShaStrategy>,
) -> Arc<JwtAccessTokenStrategy> {
    let jwt = Arc::new(JwtService::new(key, config.access_token_issuer.clone()));
    Arc::new(JwtAccessTokenStrategy::new(
        jwt,
        hmac,
        config.access_token_issuer.clone(),
    ))
}

/// Builds the ID token strategy signing with `key`.
#[must_use]
pub fn new_openid_connect_strategy(
    config: &ProviderConfig,
    key: SigningKeyPair,
) -> Arc<DefaultOpenIdStrategy> {
    let jwt = Arc::new(JwtService::new(key, config.id_token_issuer.clone()));
    Arc::new(DefaultOpenIdStrategy::new(
        jwt,
        config.id_token_issuer.clone(),
        config.lifespan(TokenKind::IdToken),
        config.min_parameter_entropy(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{AccessTokenStrategy, CoreStrategy};
    use crate::types::{Client, Request};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_hmac_strategy_uses_config_lifespans() {
        let config = ProviderConfig {
            access_token_lifespan: std::time::Duration::from_secs(120),
            ..Default::default()
        };
        let strategy = new_oauth2_hmac_strategy::<&[u8]>(&config, SECRET, &[]).unwrap();
        assert_eq!(
            strategy.lifespan(TokenKind::AccessToken),
            time::Duration::minutes(2)
        );
    }

    #[test]
    fn test_short_secret_rejected() {
        let config = ProviderConfig::default();
        assert!(new_oauth2_hmac_strategy::<&[u8]>(&config, b"short", &[]).is_err());
        assert!(new_oauth2_hmac_strategy(&config, SECRET, &[b"short".as_slice()]).is_err());
    }

    #[test]
    fn test_jwt_strategy_issues_jwt_access_tokens() {
        let config = ProviderConfig {
            access_token_issuer: "https://auth.example.com".to_string(),
            ..Default::default()
        };
        let hmac = new_oauth2_hmac_strategy::<&[u8]>(&config, SECRET, &[]).unwrap();
        let strategy =
            new_oauth2_jwt_strategy(&config, SigningKeyPair::generate_ec().unwrap(), hmac);

        let request = Request::new(Client::public("app"));
        let (token, _) = strategy.generate_access_token(&request).unwrap();
        assert_eq!(token.split('.').count(), 3);
        strategy.validate_access_token(&request, &token).unwrap();
    }
}
