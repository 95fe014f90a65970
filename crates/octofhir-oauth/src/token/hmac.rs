//! HMAC-signed opaque tokens.
//!
//! A token is `base64url(random).base64url(hmac_sha256(secret, random))`.
//! Only the part after the dot is ever stored.
//!
//! Validation accepts the current secret and every retained prior secret.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::config::MIN_SECRET_LENGTH;
use crate::{OAuthError, OAuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Minimum number of random bytes in a token.
pub const MIN_TOKEN_ENTROPY: usize = 32;

/// Generates and verifies opaque HMAC tokens.
#[derive(Clone)]
pub struct HmacStrategy {
    global_secret: Vec<u8>,
    rotated_secrets: Vec<Vec<u8>>,
    entropy: usize,
}

impl std::fmt::Debug for HmacStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacStrategy")
            .field("rotated_secrets", &self.rotated_secrets.len())
            .field("entropy", &self.entropy)
            .finish_non_exhaustive()
    }
}

impl HmacStrategy {
    /// Creates a strategy signing with `global_secret`.
    ///
    /// # Errors
    ///
    /// Returns a server error if the secret is shorter than 32 bytes.
    pub fn new(global_secret: impl Into<Vec<u8>>) -> OAuthResult<Self> {
        let global_secret = global_secret.into();
        check_secret(&global_secret)?;
        Ok(Self {
            global_secret,
            rotated_secrets: Vec::new(),
            entropy: MIN_TOKEN_ENTROPY,
        })
    }

    /// Adds prior secrets that are still accepted for validation, newest first.
    ///
    /// # Errors
    ///
    /// Returns a server error if any secret is shorter than 32 bytes.
    pub fn with_rotated_secrets<I, S>(mut self, secrets: I) -> OAuthResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        for secret in secrets {
            let secret = secret.into();
            check_secret(&secret)?;
            self.rotated_secrets.push(secret);
        }
        Ok(self)
    }

    /// Sets the number of random bytes per token. Values below 32 are raised to 32.
    #[must_use]
    pub fn with_entropy(mut self, entropy: usize) -> Self {
        self.entropy = entropy.max(MIN_TOKEN_ENTROPY);
        self
    }

    /// Generates a token. Returns `(token, signature)`.
    ///
    /// # Errors
    ///
    /// Returns a signing error if the MAC cannot be keyed.
    pub fn generate(&self) -> OAuthResult<(String, String)> {
        let mut key = vec![0u8; self.entropy];
        OsRng.fill_bytes(&mut key);

        let mac = sign(&self.global_secret, &key)?;
        let signature = URL_SAFE_NO_PAD.encode(mac);
        let token = format!("{}.{}", URL_SAFE_NO_PAD.encode(&key), signature);
        Ok((token, signature))
    }

    /// Verifies a token against the current and retained secrets.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for a malformed token and
    /// `token_signature_mismatch` when no secret produced the signature.
    pub fn validate(&self, token: &str) -> OAuthResult<()> {
        let (key, signature) = token.split_once('.').ok_or_else(|| {
            OAuthError::invalid_request().with_hint("Token does not have a signature.")
        })?;

        let key = URL_SAFE_NO_PAD.decode(key).map_err(|_| {
            OAuthError::invalid_request().with_hint("Token key is not valid base64url.")
        })?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| {
            OAuthError::invalid_request().with_hint("Token signature is not valid base64url.")
        })?;

        if verify(&self.global_secret, &key, &signature) {
            return Ok(());
        }

        for (index, secret) in self.rotated_secrets.iter().enumerate() {
            if verify(secret, &key, &signature) {
                tracing::debug!(rotated_secret = index, "Token validated with rotated secret");
                return Ok(());
            }
        }

        Err(OAuthError::token_signature_mismatch())
    }

    /// Returns the signature part of a token.
    #[must_use]
    pub fn signature(&self, token: &str) -> String {
        token
            .split_once('.')
            .map(|(_, signature)| signature.to_string())
            .unwrap_or_default()
    }
}

fn check_secret(secret: &[u8]) -> OAuthResult<()> {
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(OAuthError::server_error().with_debug(format!(
            "Secret for signing HMAC tokens must be at least {MIN_SECRET_LENGTH} bytes long, got {}",
            secret.len()
        )));
    }
    Ok(())
}

fn sign(secret: &[u8], key: &[u8]) -> OAuthResult<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| OAuthError::signing(e.to_string()))?;
    mac.update(key);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify(secret: &[u8], key: &[u8], signature: &[u8]) -> bool {
    HmacSha256::new_from_slice(secret)
        .map(|mut mac| {
            mac.update(key);
            mac.verify_slice(signature).is_ok()
        })
        .unwrap_or(false)
}
