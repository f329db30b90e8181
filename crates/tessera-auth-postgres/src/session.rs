//! PostgreSQL session store.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use tessera_auth::{AuthResult, Identity, SecretHash, SessionStore};
use tracing::instrument;
use uuid::Uuid;

use crate::{PgPool, StorageResult};

/// Session store backed by the `token_session` table.
#[derive(Debug, Clone)]
pub struct PostgresSessionStore {
    pool: Arc<PgPool>,
}

impl PostgresSessionStore {
    /// Create a store on an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch(&self, identity: Uuid) -> StorageResult<Option<String>> {
        let row: Option<(String,)> = query_as(
            r#"
            SELECT secret_hash
            FROM token_session
            WHERE identity = $1
            "#,
        )
        .bind(identity)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|(hash,)| hash))
    }

    async fn upsert(&self, identity: Uuid, hash: &str) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO token_session (identity, secret_hash, rotated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (identity)
            DO UPDATE SET secret_hash = EXCLUDED.secret_hash, rotated_at = NOW()
            "#,
        )
        .bind(identity)
        .bind(hash)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn swap(&self, identity: Uuid, expected: &str, replacement: &str) -> StorageResult<bool> {
        // A concurrent writer holding the row lock makes this wait, then the
        // WHERE clause is re-checked against the committed row.
        let result = query(
            r#"
            UPDATE token_session
            SET secret_hash = $3, rotated_at = NOW()
            WHERE identity = $1 AND secret_hash = $2
            "#,
        )
        .bind(identity)
        .bind(expected)
        .bind(replacement)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    #[instrument(skip_all, fields(identity = %identity))]
    async fn get(&self, identity: &Identity) -> AuthResult<Option<SecretHash>> {
        let hash = self.fetch(*identity.as_uuid()).await?;
        Ok(hash.map(SecretHash::new))
    }

    #[instrument(skip_all, fields(identity = %identity))]
    async fn put(&self, identity: &Identity, hash: &SecretHash) -> AuthResult<()> {
        Ok(self.upsert(*identity.as_uuid(), hash.as_str()).await?)
    }

    #[instrument(skip_all, fields(identity = %identity))]
    async fn compare_and_swap(
        &self,
        identity: &Identity,
        expected: &SecretHash,
        replacement: &SecretHash,
    ) -> AuthResult<bool> {
        Ok(self
            .swap(*identity.as_uuid(), expected.as_str(), replacement.as_str())
            .await?)
    }
}
