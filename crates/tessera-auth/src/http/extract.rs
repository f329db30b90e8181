//! Request extractors.
//!
//! Tokens are read from the `Authorization: Bearer` and `X-Refresh-Token`
//! headers first, then from the `access_token` / `refresh_token` cookies.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::device::request_context;
use crate::error::AuthError;
use crate::types::RequestContext;

/// Cookie carrying the access token.
pub const ACCESS_COOKIE: &str = "access_token";

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Header carrying the refresh token for non-browser clients.
pub const REFRESH_HEADER: &str = "x-refresh-token";

/// Device and origin of the current request.
#[derive(Debug, Clone)]
pub struct Context(pub RequestContext);

impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only present when served with `into_make_service_with_connect_info`.
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(request_context(&parts.headers, peer)))
    }
}

/// The presented access token.
#[derive(Clone)]
pub struct PresentedAccess(pub String);

impl<S> FromRequestParts<S> for PresentedAccess
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        access_token(&parts.headers, &jar)
            .map(Self)
            .ok_or_else(|| AuthError::invalid_token("missing access token"))
    }
}

/// The presented access and refresh tokens.
#[derive(Clone)]
pub struct PresentedPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl<S> FromRequestParts<S> for PresentedPair
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let access_token = access_token(&parts.headers, &jar)
            .ok_or_else(|| AuthError::invalid_token("missing access token"))?;
        let refresh_token = refresh_token(&parts.headers, &jar)
            .ok_or_else(|| AuthError::invalid_token("missing refresh token"))?;
        Ok(Self {
            access_token,
            refresh_token,
        })
    }
}

fn access_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_value(jar, ACCESS_COOKIE))
}

fn refresh_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    headers
        .get(REFRESH_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| cookie_value(jar, REFRESH_COOKIE))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
