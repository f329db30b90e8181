//! # tessera-auth-postgres
//!
//! PostgreSQL [`SessionStore`](tessera_auth::SessionStore) for tessera-auth.
//!
//! Sessions live in the `token_session` table, one row per identity.
//! Compare-and-swap is a conditional `UPDATE` on the stored hash, so
//! concurrent rotations of the same identity serialize on the row lock and at
//! most one of them matches.
//!
//! ## Usage
//!
//! ```ignore
//! use tessera_auth_postgres::{PostgresSessionStore, connect, migrations};
//!
//! let pool = connect(&database_url, 10, Duration::from_secs(5)).await?;
//! migrations::run(&pool).await?;
//! let store = PostgresSessionStore::new(Arc::new(pool));
//! ```

pub mod migrations;
pub mod session;

use std::time::Duration;

use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_postgres::Postgres;
use tessera_auth::AuthError;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use session::PostgresSessionStore;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during session storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StorageError {
    /// Create a `Migration` error.
    #[must_use]
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// Returns `true` if the database could not be reached at all.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx_core::Error::Io(_))
                | Self::Database(sqlx_core::Error::PoolTimedOut)
                | Self::Database(sqlx_core::Error::PoolClosed)
                | Self::Database(sqlx_core::Error::Tls(_))
        )
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::storage(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Opens a connection pool.
///
/// # Errors
///
/// Returns an error if the initial connection fails.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> StorageResult<PgPool> {
    let pool = PoolOptions::<Postgres>::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}
