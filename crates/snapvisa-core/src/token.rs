//! Anti-Forgery Tokens
//!
//! Session-bound random values required on every state-changing request.
//! A token is rotated after each request that changes session state, so a
//! captured value stops working as soon as the real client moves on.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// 32 random bytes, URL-safe base64 without padding
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiForgeryToken(String);

impl AntiForgeryToken {
    /// Generate a fresh token
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a client-presented value.
    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();
        if expected.len() != presented.len() {
            return false;
        }
        expected
            .iter()
            .zip(presented)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// Fail with a permission error unless `presented` matches.
    pub fn verify(&self, presented: Option<&str>) -> Result<()> {
        match presented {
            Some(value) if self.matches(value) => Ok(()),
            Some(_) => Err(CoreError::Permission(
                "Stale or invalid anti-forgery token. Reload the page and try again.".into(),
            )),
            None => Err(CoreError::Permission("Missing anti-forgery token.".into())),
        }
    }
}

// Tokens are secrets; only a prefix ever reaches logs.
impl std::fmt::Debug for AntiForgeryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "AntiForgeryToken({prefix}…)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_differ() {
        let a = AntiForgeryToken::generate();
        let b = AntiForgeryToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 43);
    }

    #[test]
    fn test_verify() {
        let token = AntiForgeryToken::generate();
        assert!(token.verify(Some(token.as_str())).is_ok());
        assert!(matches!(token.verify(None), Err(CoreError::Permission(_))));
        assert!(matches!(token.verify(Some("forged")), Err(CoreError::Permission(_))));

        let other = AntiForgeryToken::generate();
        assert!(token.verify(Some(other.as_str())).is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let token = AntiForgeryToken::generate();
        let shown = format!("{token:?}");
        assert!(!shown.contains(token.as_str()));
    }
}
