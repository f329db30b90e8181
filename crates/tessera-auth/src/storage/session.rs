//! Session store trait.
//!
//! # Security Considerations
//!
//! - Only the one-way hash of the current refresh token is stored
//! - At most one hash exists per identity; writes overwrite
//! - `compare_and_swap` must be atomic with respect to every other write

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::{Identity, SecretHash};

/// Storage trait for the per-identity session record.
///
/// # Implementations
///
/// - [`InMemorySessionStore`](super::InMemorySessionStore) - process-local, for tests and single-node use
/// - `tessera-auth-postgres` - PostgreSQL storage backend
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the stored hash for an identity.
    ///
    /// # Returns
    ///
    /// Returns `Some(hash)` if a session exists, `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the storage operation fails.
    async fn get(&self, identity: &Identity) -> AuthResult<Option<SecretHash>>;

    /// Stores a hash for an identity, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the storage operation fails.
    async fn put(&self, identity: &Identity, hash: &SecretHash) -> AuthResult<()>;

    /// Replaces the stored hash only if it still equals `expected`.
    ///
    /// # Returns
    ///
    /// Returns `true` if the swap happened. Returns `false` if the stored hash
    /// differs from `expected` or no session exists; the store is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the storage operation fails.
    async fn compare_and_swap(
        &self,
        identity: &Identity,
        expected: &SecretHash,
        replacement: &SecretHash,
    ) -> AuthResult<bool>;
}
