//! Token endpoint handlers.
//!
//! ```text
//! POST   /auth/tokens/{identity}   issue a pair
//! POST   /auth/refresh             rotate a pair
//! GET    /auth/identity            resolve an access token
//! DELETE /auth/tokens              revoke the session
//! ```
//!
//! Issued pairs are returned as JSON and also set as `HttpOnly` cookies
//! scoped to `/auth`.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use super::extract::{ACCESS_COOKIE, Context, PresentedAccess, PresentedPair, REFRESH_COOKIE};
use crate::error::AuthError;
use crate::rotation::RotationEngine;
use crate::types::{Identity, TokenPair};

/// Path all token cookies are scoped to.
pub const COOKIE_PATH: &str = "/auth";

/// Cookie attributes for issued pairs.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Set the `Secure` attribute.
    pub secure: bool,
    /// Lifetime of both cookies. The access cookie must outlive the access
    /// token so an expired token can still be presented for refresh.
    pub max_age: Duration,
}

/// State shared by the token handlers.
#[derive(Clone)]
pub struct AuthState {
    pub engine: Arc<RotationEngine>,
    pub cookies: CookieSettings,
}

impl AuthState {
    pub fn new(engine: Arc<RotationEngine>, cookies: CookieSettings) -> Self {
        Self { engine, cookies }
    }
}

/// Response of the identify endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub identity: Identity,
}

/// `POST /auth/tokens/{identity}`
pub async fn create_handler(
    State(state): State<AuthState>,
    Path(identity): Path<String>,
    Context(context): Context,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenPair>), AuthError> {
    let identity: Identity = identity
        .parse()
        .map_err(|_| AuthError::invalid_request("identity must be a UUID"))?;

    let pair = state.engine.create(identity, &context).await?;
    Ok((set_pair_cookies(jar, &pair, &state.cookies), Json(pair)))
}

/// `POST /auth/refresh`
pub async fn refresh_handler(
    State(state): State<AuthState>,
    Context(context): Context,
    presented: PresentedPair,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenPair>), AuthError> {
    let pair = state
        .engine
        .refresh(&presented.access_token, &presented.refresh_token, &context)
        .await?;
    Ok((set_pair_cookies(jar, &pair, &state.cookies), Json(pair)))
}

/// `GET /auth/identity`
pub async fn identify_handler(
    State(state): State<AuthState>,
    PresentedAccess(access_token): PresentedAccess,
) -> Result<Json<IdentityResponse>, AuthError> {
    let identity = state.engine.identify(&access_token).await?;
    Ok(Json(IdentityResponse { identity }))
}

/// `DELETE /auth/tokens`
pub async fn revoke_handler(
    State(state): State<AuthState>,
    PresentedAccess(access_token): PresentedAccess,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AuthError> {
    state.engine.revoke(&access_token).await?;
    let jar = jar
        .remove(Cookie::build(ACCESS_COOKIE).path(COOKIE_PATH))
        .remove(Cookie::build(REFRESH_COOKIE).path(COOKIE_PATH));
    Ok((jar, StatusCode::NO_CONTENT))
}

fn set_pair_cookies(jar: CookieJar, pair: &TokenPair, settings: &CookieSettings) -> CookieJar {
    jar.add(token_cookie(ACCESS_COOKIE, &pair.access_token, settings))
        .add(token_cookie(REFRESH_COOKIE, &pair.refresh_token, settings))
}

fn token_cookie(name: &'static str, value: &str, settings: &CookieSettings) -> Cookie<'static> {
    Cookie::build((name, value.to_string()))
        .http_only(true)
        .secure(settings.secure)
        .same_site(SameSite::Lax)
        .path(COOKIE_PATH)
        .max_age(settings.max_age)
        .build()
}
