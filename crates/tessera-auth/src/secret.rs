//! Refresh token hashing.
//!
//! Refresh tokens are stored as Argon2id hashes in PHC string format. Salts
//! come from `OsRng`, so hashing the same token twice yields two different
//! strings; session stores rely on this for compare-and-swap.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use crate::config::HashingConfig;
use crate::error::AuthError;
use crate::types::SecretHash;

/// Slow, salted one-way hash for refresh tokens.
#[derive(Clone)]
pub struct SecretHasher {
    params: Params,
}

impl SecretHasher {
    /// Creates a hasher with the given cost parameters.
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if argon2 rejects the parameters.
    pub fn new(config: &HashingConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthError::configuration(format!("argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes a refresh token for storage.
    ///
    /// # Errors
    /// Returns `AuthError::Hashing` if hashing fails (rare).
    pub fn hash(&self, token: &str) -> Result<SecretHash, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(token.as_bytes(), &salt)
            .map_err(|e| AuthError::hashing(e.to_string()))?;
        Ok(SecretHash::new(hash.to_string()))
    }

    /// Verifies a refresh token against a stored hash.
    ///
    /// Parameters embedded in the PHC string take precedence, so hashes
    /// written under older cost settings still verify. Comparison is
    /// constant-time.
    ///
    /// # Errors
    /// Returns `AuthError::Hashing` if the stored hash is not a valid PHC
    /// string or argon2 fails for any reason other than a mismatch.
    pub fn verify(&self, hash: &SecretHash, token: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash.as_str())
            .map_err(|e| AuthError::hashing(format!("stored hash: {e}")))?;
        match self.argon2().verify_password(token.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::hashing(format!("verifying stored hash: {e}"))),
        }
    }
}

impl std::fmt::Debug for SecretHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> SecretHasher {
    SecretHasher::new(&HashingConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}
