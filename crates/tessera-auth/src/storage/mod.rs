//! Session storage.
//!
//! A session is the single `Identity -> SecretHash` record for an identity.
//! [`SessionStore`] is implemented here in memory and by
//! `tessera-auth-postgres` for PostgreSQL.

pub mod memory;
pub mod session;

pub use memory::InMemorySessionStore;
pub use session::SessionStore;
