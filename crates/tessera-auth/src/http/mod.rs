//! HTTP transport for the rotation engine.
//!
//! # Usage
//!
//! ```ignore
//! use tessera_auth::http::{AuthState, router};
//!
//! let app = axum::Router::new().merge(router(auth_state));
//! ```

pub mod error;
pub mod extract;
pub mod handlers;

use axum::{
    Router,
    routing::{delete, get, post},
};

pub use error::{ErrorBody, status_for};
pub use extract::{Context, PresentedAccess, PresentedPair};
pub use handlers::{AuthState, CookieSettings, IdentityResponse};

/// Builds the `/auth` routes.
pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/auth/tokens/{identity}", post(handlers::create_handler))
        .route("/auth/tokens", delete(handlers::revoke_handler))
        .route("/auth/refresh", post(handlers::refresh_handler))
        .route("/auth/identity", get(handlers::identify_handler))
        .with_state(state)
}
