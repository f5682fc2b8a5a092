//! Feedback Records
//!
//! Validation and markup neutralization happen before anything is stored,
//! so a record that exists is always safe to render.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FeedbackError, Result};

/// Longest accepted name, in characters
pub const MAX_NAME_CHARS: usize = 100;

/// Longest accepted message, in characters
pub const MAX_MESSAGE_CHARS: usize = 2000;

const MAX_EMAIL_CHARS: usize = 254;

/// Raw form input
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A stored piece of feedback
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl FeedbackSubmission {
    pub fn new(name: impl Into<String>, message: impl Into<String>, email: Option<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            email,
        }
    }

    /// Check the submission and turn it into an escaped record.
    pub fn into_record(self) -> Result<FeedbackRecord> {
        let name = self.name.trim();
        let message = self.message.trim();
        let email = self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());

        if name.is_empty() {
            return Err(FeedbackError::Validation("Please enter your name.".into()));
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(FeedbackError::Validation(format!(
                "Name must be at most {MAX_NAME_CHARS} characters."
            )));
        }
        if message.is_empty() {
            return Err(FeedbackError::Validation("Please enter a message.".into()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(FeedbackError::Validation(format!(
                "Message must be at most {MAX_MESSAGE_CHARS} characters."
            )));
        }
        if let Some(email) = email {
            if !is_plausible_email(email) {
                return Err(FeedbackError::Validation(
                    "Please enter a valid email address or leave it blank.".into(),
                ));
            }
        }

        Ok(FeedbackRecord {
            name: escape_markup(name),
            message: escape_markup(message),
            email: email.map(escape_markup),
            submitted_at: Utc::now(),
        })
    }
}

/// Loose shape check: `local@domain.tld`, no whitespace.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().count() > MAX_EMAIL_CHARS || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Replace HTML-significant characters with entities.
pub fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit(name: &str, message: &str, email: Option<&str>) -> Result<FeedbackRecord> {
        FeedbackSubmission::new(name, message, email.map(str::to_string)).into_record()
    }

    #[test]
    fn test_length_limits() {
        assert!(submit(&"n".repeat(100), "hello", None).is_ok());
        assert!(submit(&"n".repeat(101), "hello", None).is_err());
        assert!(submit("Asha", &"m".repeat(2000), None).is_ok());
        assert!(matches!(
            submit("Asha", &"m".repeat(2001), None),
            Err(FeedbackError::Validation(_))
        ));
    }

    #[test]
    fn test_limits_count_characters_not_bytes() {
        assert!(submit(&"é".repeat(100), "merci", None).is_ok());
    }

    #[test]
    fn test_required_fields() {
        assert!(submit("", "hello", None).is_err());
        assert!(submit("   ", "hello", None).is_err());
        assert!(submit("Asha", "", None).is_err());
        assert!(submit("Asha", " \n ", None).is_err());
    }

    #[test]
    fn test_email_is_optional_but_checked() {
        assert!(submit("Asha", "hi", None).is_ok());
        assert_eq!(submit("Asha", "hi", Some("  ")).unwrap().email, None);
        assert!(submit("Asha", "hi", Some("asha.example.com")).is_err());
        assert_eq!(
            submit("Asha", "hi", Some("asha@example.com")).unwrap().email.as_deref(),
            Some("asha@example.com")
        );
    }

    #[test]
    fn test_plausible_email() {
        assert!(is_plausible_email("a@b.co"));
        assert!(!is_plausible_email("@b.co"));
        assert!(!is_plausible_email("a@bco"));
        assert!(!is_plausible_email("a@.co"));
        assert!(!is_plausible_email("a@b.co."));
        assert!(!is_plausible_email("a@b@c.co"));
        assert!(!is_plausible_email("a b@c.co"));
    }

    #[test]
    fn test_markup_is_neutralized() {
        let record = submit("<b>Asha</b>", "Tom & Jerry's \"photo\" <script>", None).unwrap();
        assert_eq!(record.name, "&lt;b&gt;Asha&lt;/b&gt;");
        assert_eq!(
            record.message,
            "Tom &amp; Jerry&#x27;s &quot;photo&quot; &lt;script&gt;"
        );
    }
}
