use axum::http::{
    header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use tracing::warn;

use crate::config::TransportMode;

pub const SESSION_COOKIE_NAME: &str = "pp_session";

const SESSION_COOKIE_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

/// How a freshly issued session token reaches the client and how it is
/// read back on later requests. The mode is fixed per deployment at
/// startup; handlers dispatch over it instead of duplicating bodies.
#[derive(Debug, Clone, Copy)]
pub enum SessionTransport {
    /// Token returned in the response body only; clients echo it in the
    /// Authorization header.
    Bearer,
    /// Token additionally set as an HttpOnly cookie.
    Cookie,
}

impl From<TransportMode> for SessionTransport {
    fn from(mode: TransportMode) -> Self {
        match mode {
            TransportMode::Bearer => SessionTransport::Bearer,
            TransportMode::Cookie => SessionTransport::Cookie,
        }
    }
}

impl SessionTransport {
    /// Attach the session token to an outgoing response.
    pub fn attach(&self, headers: &mut HeaderMap, token: &str) {
        if let SessionTransport::Cookie = self {
            match session_cookie(token) {
                Ok(value) => {
                    headers.insert(SET_COOKIE, value);
                }
                Err(e) => warn!(error = %e, "could not build session cookie"),
            }
        }
    }

    /// Expire the session cookie on the client.
    pub fn clear(&self, headers: &mut HeaderMap) {
        if let SessionTransport::Cookie = self {
            // Static value, always a valid header.
            if let Ok(value) = HeaderValue::from_str(&format!(
                "{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=0"
            )) {
                headers.insert(SET_COOKIE, value);
            }
        }
    }
}

fn session_cookie(token: &str) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; Secure; SameSite=None; \
         Max-Age={SESSION_COOKIE_MAX_AGE_SECS}"
    ))
}

/// Pull the session token out of an incoming request, regardless of the
/// deployment mode: `Authorization: Bearer` wins, the cookie is the
/// fallback.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        // A pair without '=' is a valid nameless cookie; skip it and keep
        // scanning instead of giving up on the whole header.
        let Some(key) = parts.next() else { continue };
        let Some(val) = parts.next() else { continue };
        if key.trim() == SESSION_COOKIE_NAME && !val.trim().is_empty() {
            return Some(val.trim().to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .trim()
        .strip_prefix("Bearer ")
        .or_else(|| value.trim().strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
