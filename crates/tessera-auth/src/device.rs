//! Request context extraction.
//!
//! The device fingerprint is the raw `User-Agent` value. The origin is the
//! client address as reported by a fronting proxy, falling back to the peer
//! address of the TCP connection.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::types::RequestContext;

/// Extract the User-Agent header value.
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

/// Extract the client origin from proxy headers.
///
/// `X-Forwarded-For` may list `client, proxy1, proxy2`; the first entry wins.
/// `X-Real-IP` is used when no forwarded chain is present.
pub fn extract_forwarded_origin(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(client_ip) = value.split(',').next()
        && !client_ip.trim().is_empty()
    {
        return Some(client_ip.trim().to_string());
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return Some(value.trim().to_string());
    }

    None
}

/// Build the request context from headers and, if known, the peer address.
pub fn request_context(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestContext {
    let origin = extract_forwarded_origin(headers).or_else(|| peer.map(|addr| addr.ip().to_string()));
    RequestContext::new(extract_user_agent(headers), origin)
}

/// Human-readable device label like "Firefox on Linux", for notifications.
pub fn device_label(user_agent: Option<&str>) -> String {
    let Some(ua) = user_agent else {
        return "Unknown Device".to_string();
    };
    let ua = ua.to_lowercase();

    // Edge and Opera contain "chrome/", Chrome contains "safari/"
    let browser = if ua.contains("edg/") {
        "Edge"
    } else if ua.contains("opr/") {
        "Opera"
    } else if ua.contains("chrome/") {
        "Chrome"
    } else if ua.contains("firefox/") {
        "Firefox"
    } else if ua.contains("safari/") {
        "Safari"
    } else if ua.starts_with("curl/") {
        "curl"
    } else {
        "Unknown Browser"
    };

    let os = if ua.contains("windows") {
        "Windows"
    } else if ua.contains("iphone") {
        "iOS"
    } else if ua.contains("ipad") {
        "iPadOS"
    } else if ua.contains("mac os x") || ua.contains("macintosh") {
        "macOS"
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Unknown OS"
    };

    format!("{browser} on {os}")
}
