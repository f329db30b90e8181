//! In-memory session store.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::SessionStore;
use crate::AuthResult;
use crate::types::{Identity, SecretHash};

/// Session store backed by a concurrent map.
///
/// Sessions do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<Identity, SecretHash>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of identities with a session.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if no sessions exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, identity: &Identity) -> AuthResult<Option<SecretHash>> {
        Ok(self.sessions.get(identity).map(|entry| entry.value().clone()))
    }

    async fn put(&self, identity: &Identity, hash: &SecretHash) -> AuthResult<()> {
        self.sessions.insert(*identity, hash.clone());
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        identity: &Identity,
        expected: &SecretHash,
        replacement: &SecretHash,
    ) -> AuthResult<bool> {
        // The shard lock is held for the comparison and the write.
        match self.sessions.entry(*identity) {
            Entry::Occupied(mut entry) => {
                if entry.get() != expected {
                    return Ok(false);
                }
                entry.insert(replacement.clone());
                Ok(true)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }
}
