//! Session Cookie Middleware
//!
//! Visitors are identified by `snapvisa_session=<id>.<hex hmac-sha256(id)>`.
//! A missing, malformed or forged cookie gets a brand new session.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{digest::InvalidLength, Hmac, Mac};
use sha2::{Digest, Sha256};
use snapvisa_core::{SessionId, SessionStore};

use crate::error::ApiError;
use crate::state::AppState;

pub const COOKIE_NAME: &str = "snapvisa_session";

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies session cookie values
pub struct SessionCookies {
    keyed: HmacSha256,
}

impl SessionCookies {
    pub fn new(key: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self {
            keyed: HmacSha256::new_from_slice(key)?,
        })
    }

    fn mac(&self) -> HmacSha256 {
        self.keyed.clone()
    }

    /// Cookie value for `id`
    pub fn sign(&self, id: &SessionId) -> String {
        let mut mac = self.mac();
        mac.update(id.as_str().as_bytes());
        format!("{}.{}", id, hex::encode(mac.finalize().into_bytes()))
    }

    /// Session id from a cookie value, if the signature holds.
    pub fn verify(&self, value: &str) -> Option<SessionId> {
        let (id, signature) = value.split_once('.')?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(SessionId::from_string(id))
    }

    pub fn set_cookie_header(&self, id: &SessionId, max_age_secs: i64) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{COOKIE_NAME}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}",
            self.sign(id)
        ))
        .ok()
    }
}

/// Value of our cookie in the request's `Cookie` headers
pub fn cookie_value(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == COOKIE_NAME).then_some(value)
        })
}

/// Resolve the caller's session and expose its id as a request extension.
pub async fn session_layer(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let presented = cookie_value(request.headers()).and_then(|v| state.cookies.verify(v));
    let (id, issue_cookie) = match presented {
        Some(id) => (id, false),
        None => (SessionId::new(), true),
    };

    let created = match state.sessions.ensure(&id) {
        Ok(created) => created,
        Err(e) => return ApiError::from(e).into_response(),
    };
    if created {
        tracing::debug!(session = %id, "New session");
        if let Err(e) = state.sessions.purge_expired() {
            tracing::warn!(error = %e, "Session purge failed");
        }
    }

    request.extensions_mut().insert(id.clone());
    let mut response = next.run(request).await;

    if issue_cookie {
        if let Some(cookie) = state
            .cookies
            .set_cookie_header(&id, state.sessions.ttl().num_seconds())
        {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }

    response
}

/// Constant-time equality of two secrets of any length.
pub fn secrets_match(expected: &str, presented: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let presented = Sha256::digest(presented.as_bytes());
    expected
        .iter()
        .zip(presented.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let cookies = SessionCookies::new(b"test-secret").unwrap();
        let id = SessionId::new();

        let value = cookies.sign(&id);
        assert_eq!(cookies.verify(&value), Some(id));
    }

    #[test]
    fn test_tampered_cookie_rejected() {
        let cookies = SessionCookies::new(b"test-secret").unwrap();
        let value = cookies.sign(&SessionId::from_string("aaaa"));

        let forged = value.replacen("aaaa", "bbbb", 1);
        assert_eq!(cookies.verify(&forged), None);
        assert_eq!(cookies.verify("aaaa"), None);
        assert_eq!(cookies.verify("aaaa.zz"), None);

        let other = SessionCookies::new(b"other-secret").unwrap();
        assert_eq!(other.verify(&value), None);
    }

    #[test]
    fn test_cookie_value_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; snapvisa_session=abc.def; other=1"),
        );
        assert_eq!(cookie_value(&headers), Some("abc.def"));
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("hunter2", "hunter2"));
        assert!(!secrets_match("hunter2", "hunter3"));
        assert!(!secrets_match("hunter2", ""));
    }
}
