//! Caller origin and token extraction.
//!
//! Pure helpers over request headers. Nothing here validates a token.

use axum::http::{header, HeaderMap};
use serde::Deserialize;
use std::net::SocketAddr;

use crate::auth::UNKNOWN_ORIGIN;

/// Cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth_token";

/// Query string for long-lived connections (`?token=...`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionAuthQuery {
    pub token: Option<String>,
}

/// Best-effort caller identifier for throttling: first `X-Forwarded-For`
/// hop, then `X-Real-IP`, then the peer address, then `"unknown"`.
pub fn client_origin(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for header_name in ["X-Forwarded-For", "X-Real-IP"] {
        if let Some(value) = headers.get(header_name).and_then(|v| v.to_str().ok()) {
            let first = value.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    peer.map_or_else(|| UNKNOWN_ORIGIN.into(), |addr| addr.ip().to_string())
}

/// Token from `Authorization: Bearer <token>`. A bare `Bearer ` yields
/// `Some("")` so the caller rejects it instead of trying the cookie.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Value of cookie `name` across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .into_iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Request token: bearer header first, then the auth cookie. The cookie is
/// only consulted when no bearer header is present.
pub fn token_from_request(headers: &HeaderMap) -> Option<&str> {
    extract_bearer_token(headers).or_else(|| cookie_value(headers, AUTH_COOKIE))
}

/// Long-lived connection token: query parameter first, then the auth cookie.
pub fn token_from_connection<'a>(
    query_token: Option<&'a str>,
    headers: &'a HeaderMap,
) -> Option<&'a str> {
    query_token
        .filter(|t| !t.is_empty())
        .or_else(|| cookie_value(headers, AUTH_COOKIE))
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age_secs: u64) -> String {
    format!("{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{AUTH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
