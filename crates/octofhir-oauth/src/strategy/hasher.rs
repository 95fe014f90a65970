//! Client secret hashing.
//!
//! Secrets are stored as Argon2id PHC strings. Verification reads the
//! parameters from the stored hash, so changing the cost only affects newly
//! hashed secrets.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::{OAuthError, OAuthResult};

/// Hashes and verifies client secrets.
pub trait Hasher: Send + Sync {
    /// Hashes a secret for storage.
    ///
    /// # Errors
    ///
    /// Returns a server error if hashing fails.
    fn hash(&self, secret: &[u8]) -> OAuthResult<String>;

    /// Compares a plaintext secret against a stored hash.
    ///
    /// # Returns
    ///
    /// `Ok(true)` on match, `Ok(false)` on mismatch.
    ///
    /// # Errors
    ///
    /// Returns a server error only if the stored hash is malformed.
    fn compare(&self, hash: &str, secret: &[u8]) -> OAuthResult<bool>;
}

/// Argon2id hasher.
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Hasher").finish_non_exhaustive()
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl Argon2Hasher {
    /// Creates a hasher with default Argon2id parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a hasher with explicit cost parameters.
    ///
    /// # Errors
    ///
    /// Returns a server error if the parameters are out of range.
    pub fn with_params(m_cost_kib: u32, t_cost: u32, p_cost: u32) -> OAuthResult<Self> {
        let params = Params::new(m_cost_kib, t_cost, p_cost, None)
            .map_err(|e| OAuthError::server_error().with_debug(e.to_string()))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Hasher for Argon2Hasher {
    fn hash(&self, secret: &[u8]) -> OAuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret, &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| OAuthError::server_error().with_debug(e.to_string()))
    }

    fn compare(&self, hash: &str, secret: &[u8]) -> OAuthResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            OAuthError::server_error()
                .with_hint("The stored client secret hash is malformed.")
                .with_debug(e.to_string())
        })?;
        Ok(self.argon2.verify_password(secret, &parsed).is_ok())
    }
}
