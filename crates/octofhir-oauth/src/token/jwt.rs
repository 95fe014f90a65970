//! JWT signing and verification.
//!
//! [`JwtService`] signs claims with a [`SigningKeyPair`] and is the default
//! [`JwtStrategy`]: the generic signer shared by JWT access tokens and
//! OpenID Connect ID tokens.
//!
//! ## Supported Algorithms
//!
//! - **RS256**: RSA with SHA-256
//! - **RS384**: RSA with SHA-384
//! - **ES384**: ECDSA with P-384 curve
//!
//! ## Example
//!
//! ```ignore
//! use octofhir_oauth::token::jwt::{JwtService, SigningKeyPair};
//!
//! let key_pair = SigningKeyPair::generate_ec()?;
//! let jwt = JwtService::new(key_pair, "https://auth.example.com");
//!
//! let token = jwt.encode(&claims)?;
//! let data = jwt.decode::<AccessTokenClaims>(&token)?;
//! ```

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode,
};
use p384::SecretKey as EcSecretKey;
use p384::ecdsa::SigningKey as EcSigningKey;
use p384::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::strategy::JwtStrategy;
use crate::OAuthError;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// Failed to generate a cryptographic key.
    #[error("Key generation error: {message}")]
    KeyGenerationError {
        /// Description of the key generation error.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `KeyGenerationError`.
    #[must_use]
    pub fn key_generation_error(message: impl Into<String>) -> Self {
        Self::KeyGenerationError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` if the input was not a JWT at all.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::DecodingError { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

impl From<JwtError> for OAuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => OAuthError::token_expired().with_hint("Token expired."),
            JwtError::InvalidSignature => OAuthError::token_signature_mismatch(),
            JwtError::InvalidClaims { .. } | JwtError::DecodingError { .. } => {
                OAuthError::request_unauthorized().with_debug(err.to_string())
            }
            JwtError::EncodingError { .. }
            | JwtError::KeyGenerationError { .. }
            | JwtError::InvalidKey { .. } => OAuthError::signing(err.to_string()),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-384 curve.
    ES384,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Returns the algorithm name as used in JWK/JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` if this is an RSA-based algorithm.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Token Claims
// ============================================================================

/// Claims of a JWT access token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// Issuer.
    #[serde(default)]
    pub iss: String,

    /// Subject (resource owner, or the client for client-only grants).
    #[serde(default)]
    pub sub: String,

    /// Granted audiences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    #[serde(default)]
    pub iat: i64,

    /// Token identifier. Carries the request id.
    #[serde(default)]
    pub jti: String,

    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: String,

    /// Client the token was issued to.
    #[serde(default)]
    pub client_id: String,

    /// Additional claims.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub ext: Map<String, Value>,
}

/// Claims of an OpenID Connect ID token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IdTokenClaims {
    /// Issuer.
    #[serde(default)]
    pub iss: String,

    /// Subject (end-user id).
    pub sub: String,

    /// Audience. Always contains the client id once issued.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aud: Vec<String>,

    /// Expiration time (Unix timestamp).
    #[serde(default)]
    pub exp: i64,

    /// Issued at (Unix timestamp).
    #[serde(default)]
    pub iat: i64,

    /// Token identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Time of end-user authentication (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    /// Nonce from the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Access token hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,

    /// Additional claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdTokenClaims {
    /// Creates claims for a subject. Everything else is filled at issuance.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            sub: subject.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// JWKS Types
// ============================================================================

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

/// JSON Web Key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "EC").
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use ("sig" for signing).
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm.
    pub alg: String,

    /// RSA modulus (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// A signing key pair.
#[derive(Clone)]
pub struct SigningKeyPair {
    /// Key ID.
    pub kid: String,

    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,

    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key_data: PublicKeyData,

    /// When the key was created.
    pub created_at: OffsetDateTime,
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
enum PublicKeyData {
    Rsa { n: Vec<u8>, e: Vec<u8> },
    Ec { x: Vec<u8>, y: Vec<u8> },
}

impl SigningKeyPair {
    /// Generates a new 2048-bit RSA key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails or algorithm is not RSA-based.
    pub fn generate_rsa(algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        if !algorithm.is_rsa() {
            return Err(JwtError::invalid_key(format!(
                "Algorithm {} is not RSA-based",
                algorithm
            )));
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, 2048)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        let public_key = private_key.to_public_key();
        let n = public_key.n().to_bytes_be();
        let e = public_key.e().to_bytes_be();

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        Ok(Self {
            kid: uuid::Uuid::new_v4().to_string(),
            algorithm,
            encoding_key,
            decoding_key,
            public_key_data: PublicKeyData::Rsa { n, e },
            created_at: OffsetDateTime::now_utc(),
        })
    }

    /// Generates a new P-384 key pair for ES384.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate_ec() -> Result<Self, JwtError> {
        let secret_key = EcSecretKey::random(&mut OsRng);
        let private_pem = secret_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        Self::from_ec_secret(uuid::Uuid::new_v4().to_string(), &secret_key, &private_pem)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))
    }

    fn from_ec_secret(
        kid: String,
        secret_key: &EcSecretKey,
        private_pem: &str,
    ) -> Result<Self, JwtError> {
        let signing_key = EcSigningKey::from(secret_key);
        let point = signing_key.verifying_key().to_encoded_point(false);
        let x = point
            .x()
            .ok_or_else(|| JwtError::invalid_key("Missing x coordinate"))?;
        let y = point
            .y()
            .ok_or_else(|| JwtError::invalid_key("Missing y coordinate"))?;

        let encoding_key = EncodingKey::from_ec_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let x_b64 = URL_SAFE_NO_PAD.encode(x.as_slice());
        let y_b64 = URL_SAFE_NO_PAD.encode(y.as_slice());
        let decoding_key = DecodingKey::from_ec_components(&x_b64, &y_b64)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            kid,
            algorithm: SigningAlgorithm::ES384,
            encoding_key,
            decoding_key,
            public_key_data: PublicKeyData::Ec {
                x: x.to_vec(),
                y: y.to_vec(),
            },
            created_at: OffsetDateTime::now_utc(),
        })
    }

    /// Loads a key pair from PEM.
    ///
    /// RSA keys need both halves. For ES384 the public half is derived from
    /// the PKCS#8 (or SEC1) private key and `public_pem` is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM data is invalid.
    pub fn from_pem(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        private_pem: &str,
        public_pem: &str,
    ) -> Result<Self, JwtError> {
        if !algorithm.is_rsa() {
            let secret_key = EcSecretKey::from_pkcs8_pem(private_pem)
                .or_else(|_| EcSecretKey::from_sec1_pem(private_pem))
                .map_err(|e| JwtError::invalid_key(e.to_string()))?;
            let pkcs8 = secret_key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| JwtError::invalid_key(e.to_string()))?;
            return Self::from_ec_secret(kid.into(), &secret_key, &pkcs8);
        }

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let n = public_key.n().to_bytes_be();
        let e = public_key.e().to_bytes_be();

        Ok(Self {
            kid: kid.into(),
            algorithm,
            encoding_key,
            decoding_key,
            public_key_data: PublicKeyData::Rsa { n, e },
            created_at: OffsetDateTime::now_utc(),
        })
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        let (kty, n, e, crv, x, y) = match &self.public_key_data {
            PublicKeyData::Rsa { n, e } => (
                "RSA",
                Some(URL_SAFE_NO_PAD.encode(n)),
                Some(URL_SAFE_NO_PAD.encode(e)),
                None,
                None,
                None,
            ),
            PublicKeyData::Ec { x, y } => (
                "EC",
                None,
                None,
                Some("P-384".to_string()),
                Some(URL_SAFE_NO_PAD.encode(x)),
                Some(URL_SAFE_NO_PAD.encode(y)),
            ),
        };

        Jwk {
            kty: kty.to_string(),
            kid: self.kid.clone(),
            use_: "sig".to_string(),
            alg: self.algorithm.as_str().to_string(),
            n,
            e,
            crv,
            x,
            y,
        }
    }
}

// ============================================================================
// JWT Service
// ============================================================================

/// Encodes and decodes JWTs with one signing key.
#[derive(Debug, Clone)]
pub struct JwtService {
    signing_key: SigningKeyPair,
    issuer: String,
}

impl JwtService {
    /// Creates a service.
    ///
    /// Tokens are only accepted on decode if their `iss` equals `issuer`.
    /// An empty issuer disables that check.
    #[must_use]
    pub fn new(signing_key: SigningKeyPair, issuer: impl Into<String>) -> Self {
        Self {
            signing_key,
            issuer: issuer.into(),
        }
    }

    /// Encodes claims into a JWT string.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let mut header = Header::new(self.signing_key.algorithm.to_jwt_algorithm());
        header.kid = Some(self.signing_key.kid.clone());

        encode(&header, claims, &self.signing_key.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Decodes and validates a JWT string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or validation fails.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<TokenData<T>, JwtError> {
        let mut validation = Validation::new(self.signing_key.algorithm.to_jwt_algorithm());
        if !self.issuer.is_empty() {
            validation.set_issuer(&[&self.issuer]);
        }
        validation.validate_exp = true;
        validation.validate_aud = false;

        decode(token, &self.signing_key.decoding_key, &validation).map_err(JwtError::from)
    }

    /// Returns the issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the current signing key ID.
    #[must_use]
    pub fn current_kid(&self) -> &str {
        &self.signing_key.kid
    }
}

impl JwtStrategy for JwtService {
    fn generate(&self, claims: &Value) -> Result<String, JwtError> {
        self.encode(claims)
    }

    fn validate(&self, token: &str) -> Result<Map<String, Value>, JwtError> {
        self.decode::<Map<String, Value>>(token).map(|data| data.claims)
    }

    fn jwks(&self) -> Jwks {
        Jwks {
            keys: vec![self.signing_key.to_jwk()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset: i64) -> AccessTokenClaims {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        AccessTokenClaims {
            iss: "https://auth.example.com".to_string(),
            sub: "alice".to_string(),
            aud: vec!["https://api.example.com".to_string()],
            exp: now + exp_offset,
            iat: now,
            jti: "req-1".to_string(),
            scope: "read write".to_string(),
            client_id: "svc".to_string(),
            ext: Map::new(),
        }
    }

    #[test]
    fn test_es384_encode_decode() {
        let service = JwtService::new(
            SigningKeyPair::generate_ec().unwrap(),
            "https://auth.example.com",
        );
        let token = service.encode(&claims(3600)).unwrap();
        let decoded = service.decode::<AccessTokenClaims>(&token).unwrap();
        assert_eq!(decoded.claims.sub, "alice");
        assert_eq!(decoded.claims.aud, vec!["https://api.example.com".to_string()]);
        assert_eq!(decoded.header.kid.as_deref(), Some(service.current_kid()));
    }

    #[test]
    fn test_rs256_encode_decode() {
        let service = JwtService::new(
            SigningKeyPair::generate_rsa(SigningAlgorithm::RS256).unwrap(),
            "https://auth.example.com",
        );
        let token = service.encode(&claims(3600)).unwrap();
        let decoded = service.decode::<AccessTokenClaims>(&token).unwrap();
        assert_eq!(decoded.claims.client_id, "svc");
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = JwtService::new(SigningKeyPair::generate_ec().unwrap(), "");
        let token = service.encode(&claims(-3600)).unwrap();
        assert!(matches!(
            service.decode::<AccessTokenClaims>(&token).unwrap_err(),
            JwtError::Expired
        ));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let a = JwtService::new(SigningKeyPair::generate_ec().unwrap(), "");
        let b = JwtService::new(SigningKeyPair::generate_ec().unwrap(), "");
        let token = a.encode(&claims(3600)).unwrap();
        assert!(matches!(
            b.decode::<AccessTokenClaims>(&token).unwrap_err(),
            JwtError::InvalidSignature
        ));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let key = SigningKeyPair::generate_ec().unwrap();
        let signer = JwtService::new(key.clone(), "");
        let verifier = JwtService::new(key, "https://other.example.com");
        let token = signer.encode(&claims(3600)).unwrap();
        assert!(matches!(
            verifier.decode::<AccessTokenClaims>(&token).unwrap_err(),
            JwtError::InvalidClaims { .. }
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let service = JwtService::new(SigningKeyPair::generate_ec().unwrap(), "");
        let err = service.validate("not-a-jwt.abc").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_strategy_roundtrip_via_value() {
        let service = JwtService::new(SigningKeyPair::generate_ec().unwrap(), "");
        let value = serde_json::to_value(claims(60)).unwrap();
        let token = service.generate(&value).unwrap();
        let map = service.validate(&token).unwrap();
        assert_eq!(map["scope"], "read write");
        assert_eq!(service.signature(&token), token.rsplit('.').next().unwrap());
    }

    #[test]
    fn test_id_token_claims_flatten_extra() {
        let mut claims = IdTokenClaims::new("alice");
        claims.nonce = Some("n-0S6_WzA2Mj".to_string());
        claims
            .extra
            .insert("email".to_string(), Value::from("alice@example.com"));

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["nonce"], "n-0S6_WzA2Mj");
        assert!(json.get("at_hash").is_none());
    }

    #[test]
    fn test_jwk_export() {
        let ec = SigningKeyPair::generate_ec().unwrap().to_jwk();
        assert_eq!(ec.kty, "EC");
        assert_eq!(ec.crv.as_deref(), Some("P-384"));
        assert!(ec.n.is_none());

        let service = JwtService::new(SigningKeyPair::generate_ec().unwrap(), "");
        let jwks = service.jwks();
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].kid, service.current_kid());
    }

    #[test]
    fn test_ec_from_pem_roundtrip() {
        let secret = EcSecretKey::random(&mut OsRng);
        let pem = secret.to_pkcs8_pem(LineEnding::LF).unwrap();
        let key = SigningKeyPair::from_pem("k1", SigningAlgorithm::ES384, &pem, "").unwrap();
        assert_eq!(key.kid, "k1");

        let service = JwtService::new(key, "");
        let token = service.encode(&claims(60)).unwrap();
        assert!(service.decode::<AccessTokenClaims>(&token).is_ok());
    }
}
