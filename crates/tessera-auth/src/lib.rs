//! # tessera-auth
//!
//! Rotating access/refresh token pairs with replay detection.
//!
//! Each identity has at most one live session: the hash of the refresh
//! token of its current generation. Every issue, refresh and revoke replaces
//! that hash, which is what invalidates earlier pairs.
//!
//! ## Modules
//!
//! - [`config`] - Token lifetimes, key material, hashing and notification settings
//! - [`token`] - Access token signing and refresh token encoding
//! - [`secret`] - Argon2 hashing of refresh tokens
//! - [`storage`] - Session store trait and in-memory implementation
//! - [`rotation`] - The rotation engine: create, refresh, identify, revoke
//! - [`anomaly`] - Origin anomaly events and notifiers
//! - [`device`] - Request context extraction
//! - [`http`] - Axum handlers and error responses

pub mod anomaly;
pub mod config;
pub mod device;
pub mod error;
pub mod http;
pub mod rotation;
pub mod secret;
pub mod storage;
pub mod token;
pub mod types;

pub use anomaly::{AnomalyNotifier, LogNotifier, NotificationError, OriginAnomaly, WebhookNotifier};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use rotation::RotationEngine;
pub use secret::SecretHasher;
pub use storage::{InMemorySessionStore, SessionStore};
pub use token::{JwtService, RefreshTokenCodec, SigningAlgorithm, SigningKeyPair};
pub use types::{Generation, Identity, RequestContext, SecretHash, TokenPair};

/// Type alias for token operation results.
pub type AuthResult<T> = Result<T, AuthError>;
