//! OAuth 2.0 client registrations.

use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};

use super::Arguments;

// =============================================================================
// Token Endpoint Auth Method
// =============================================================================

/// How a client authenticates at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// HTTP Basic with client_id and client_secret.
    #[default]
    ClientSecretBasic,
    /// client_id and client_secret in the form body.
    ClientSecretPost,
    /// Signed JWT assertion (RFC 7523).
    PrivateKeyJwt,
    /// Public client, client_id only.
    None,
}

impl TokenEndpointAuthMethod {
    /// Returns the registration metadata value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::PrivateKeyJwt => "private_key_jwt",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client
// =============================================================================

/// A registered OAuth 2.0 client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier.
    pub id: String,

    /// Hashed client secret (confidential clients).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashed_secret: Option<String>,

    /// Whether this is a confidential client.
    pub confidential: bool,

    /// Grant types the client may use.
    #[serde(default)]
    pub grant_types: Arguments,

    /// Response types the client may request at the authorization endpoint.
    #[serde(default)]
    pub response_types: Arguments,

    /// Registered redirect URIs.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Scopes the client may request.
    #[serde(default)]
    pub scopes: Arguments,

    /// Audiences the client may request.
    #[serde(default)]
    pub audience: Arguments,

    /// Token endpoint authentication method.
    #[serde(default)]
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// Inline public keys for `private_key_jwt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JwkSet>,

    /// Location of the client's public keys for `private_key_jwt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
}

impl Client {
    /// Creates a confidential client authenticating with HTTP Basic.
    #[must_use]
    pub fn confidential(id: impl Into<String>, hashed_secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hashed_secret: Some(hashed_secret.into()),
            confidential: true,
            ..Default::default()
        }
    }

    /// Creates a public client.
    #[must_use]
    pub fn public(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            confidential: false,
            token_endpoint_auth_method: TokenEndpointAuthMethod::None,
            ..Default::default()
        }
    }

    /// Sets the allowed grant types.
    #[must_use]
    pub fn with_grant_types<I, S>(mut self, grant_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grant_types = grant_types.into_iter().collect();
        self
    }

    /// Sets the allowed response types.
    #[must_use]
    pub fn with_response_types<I, S>(mut self, response_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.response_types = response_types.into_iter().collect();
        self
    }

    /// Sets the allowed scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().collect();
        self
    }

    /// Sets the allowed audiences.
    #[must_use]
    pub fn with_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience = audience.into_iter().collect();
        self
    }

    /// Sets the registered redirect URIs.
    #[must_use]
    pub fn with_redirect_uris<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redirect_uris = uris.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the token endpoint authentication method.
    #[must_use]
    pub fn with_token_endpoint_auth_method(mut self, method: TokenEndpointAuthMethod) -> Self {
        self.token_endpoint_auth_method = method;
        self
    }

    /// Sets the inline JWKS.
    #[must_use]
    pub fn with_jwks(mut self, jwks: JwkSet) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Sets the JWKS location.
    #[must_use]
    pub fn with_jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// Returns `true` for public clients.
    #[must_use]
    pub fn is_public(&self) -> bool {
        !self.confidential
    }

    /// Checks if the given redirect URI is registered for this client.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Validates the registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client configuration is inconsistent.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        if self.is_public() && self.grant_types.has("client_credentials") {
            return Err(ClientValidationError::PublicClientCredentials);
        }

        match self.token_endpoint_auth_method {
            TokenEndpointAuthMethod::PrivateKeyJwt => {
                if self.jwks.is_none() && self.jwks_uri.is_none() {
                    return Err(ClientValidationError::MissingKeys);
                }
            }
            TokenEndpointAuthMethod::None => {}
            _ => {
                if self.confidential && self.hashed_secret.is_none() {
                    return Err(ClientValidationError::MissingSecret);
                }
            }
        }

        if self.grant_types.has("authorization_code") && self.redirect_uris.is_empty() {
            return Err(ClientValidationError::NoRedirectUris);
        }

        Ok(())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Errors that can occur during client validation.
#[derive(Debug, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// At least one grant type is required.
    #[error("At least one grant type is required")]
    NoGrantTypes,

    /// Public clients cannot use client_credentials grant.
    #[error("Public clients cannot use client_credentials grant")]
    PublicClientCredentials,

    /// Authorization code flow requires redirect URIs.
    #[error("Authorization code flow requires redirect URIs")]
    NoRedirectUris,

    /// Confidential clients require a client secret.
    #[error("Confidential clients require a client secret")]
    MissingSecret,

    /// private_key_jwt clients require jwks or jwks_uri.
    #[error("private_key_jwt clients require jwks or jwks_uri")]
    MissingKeys,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidential_client_validates() {
        let client = Client::confidential("svc", "$argon2id$hash")
            .with_grant_types(["client_credentials"])
            .with_scopes(["read"]);
        assert!(client.validate().is_ok());
        assert!(!client.is_public());
    }

    #[test]
    fn test_public_client_credentials_rejected() {
        let client = Client::public("spa").with_grant_types(["client_credentials"]);
        assert!(matches!(
            client.validate(),
            Err(ClientValidationError::PublicClientCredentials)
        ));
    }

    #[test]
    fn test_private_key_jwt_requires_keys() {
        let client = Client {
            id: "backend".to_string(),
            confidential: true,
            grant_types: Arguments::from_space_delimited("client_credentials"),
            token_endpoint_auth_method: TokenEndpointAuthMethod::PrivateKeyJwt,
            ..Default::default()
        };
        assert!(matches!(
            client.validate(),
            Err(ClientValidationError::MissingKeys)
        ));

        let client = client.with_jwks_uri("https://backend.example.com/jwks");
        assert!(client.validate().is_ok());
    }

    #[test]
    fn test_authorization_code_requires_redirect_uris() {
        let client =
            Client::confidential("web", "hash").with_grant_types(["authorization_code"]);
        assert!(matches!(
            client.validate(),
            Err(ClientValidationError::NoRedirectUris)
        ));
        let client = client.with_redirect_uris(["https://web.example.com/cb"]);
        assert!(client.validate().is_ok());
        assert!(client.is_redirect_uri_allowed("https://web.example.com/cb"));
        assert!(!client.is_redirect_uri_allowed("https://web.example.com/cb/"));
    }

    #[test]
    fn test_auth_method_serde() {
        let json = serde_json::to_string(&TokenEndpointAuthMethod::PrivateKeyJwt).unwrap();
        assert_eq!(json, "\"private_key_jwt\"");
        assert_eq!(TokenEndpointAuthMethod::None.to_string(), "none");
    }
}
