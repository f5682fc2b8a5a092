//! Google Form Sink
//!
//! Posts each record to a form's `formResponse` endpoint. The form's own
//! response sheet is the durable log, so listing is not supported here.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FeedbackError, Result};
use crate::record::FeedbackRecord;
use crate::sink::FeedbackSink;

/// Google Form sink configuration
#[derive(Clone, Debug)]
pub struct GoogleFormConfig {
    /// `https://docs.google.com/forms/d/e/<id>/formResponse`
    pub url: String,

    /// Entry id for the name field, e.g. `entry.123456`
    pub name_field: String,

    /// Entry id for the message field
    pub message_field: String,

    /// Entry id for the optional email field
    pub email_field: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl GoogleFormConfig {
    /// Read `FEEDBACK_FORM_*` variables. `None` when no form URL is set.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(url) = non_empty_var("FEEDBACK_FORM_URL") else {
            return Ok(None);
        };

        let name_field = non_empty_var("FEEDBACK_FORM_NAME_FIELD").ok_or_else(|| {
            FeedbackError::Config("FEEDBACK_FORM_NAME_FIELD must be set with FEEDBACK_FORM_URL".into())
        })?;
        let message_field = non_empty_var("FEEDBACK_FORM_MESSAGE_FIELD").ok_or_else(|| {
            FeedbackError::Config(
                "FEEDBACK_FORM_MESSAGE_FIELD must be set with FEEDBACK_FORM_URL".into(),
            )
        })?;

        Ok(Some(Self {
            url,
            name_field,
            message_field,
            email_field: non_empty_var("FEEDBACK_FORM_EMAIL_FIELD"),
            timeout_secs: 10,
        }))
    }

    fn form_fields<'a>(&'a self, record: &'a FeedbackRecord) -> Vec<(&'a str, &'a str)> {
        let mut fields = vec![
            (self.name_field.as_str(), record.name.as_str()),
            (self.message_field.as_str(), record.message.as_str()),
        ];
        if let (Some(field), Some(email)) = (&self.email_field, &record.email) {
            fields.push((field.as_str(), email.as_str()));
        }
        fields
    }
}

/// Remote Google Form
pub struct GoogleFormSink {
    client: reqwest::Client,
    config: GoogleFormConfig,
}

impl GoogleFormSink {
    pub fn new(config: GoogleFormConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FeedbackError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GoogleFormConfig {
        &self.config
    }
}

#[async_trait]
impl FeedbackSink for GoogleFormSink {
    fn name(&self) -> &'static str {
        "google-form"
    }

    async fn append(&self, record: &FeedbackRecord) -> Result<()> {
        let response = self
            .client
            .post(&self.config.url)
            .form(&self.config.form_fields(record))
            .send()
            .await
            .map_err(|e| FeedbackError::Storage(format!("Form submission failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedbackError::Storage(format!(
                "Form endpoint returned {status}"
            )));
        }

        tracing::debug!(%status, "Feedback posted to form");
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FeedbackSubmission;

    fn config(email_field: Option<&str>) -> GoogleFormConfig {
        GoogleFormConfig {
            url: "https://docs.google.com/forms/d/e/test/formResponse".into(),
            name_field: "entry.1".into(),
            message_field: "entry.2".into(),
            email_field: email_field.map(str::to_string),
            timeout_secs: 10,
        }
    }

    #[test]
    fn test_form_fields_map_entry_ids() {
        let record = FeedbackSubmission::new("Asha", "Nice", Some("a@b.co".into()))
            .into_record()
            .unwrap();

        let with_email = config(Some("entry.3"));
        assert_eq!(
            with_email.form_fields(&record),
            vec![("entry.1", "Asha"), ("entry.2", "Nice"), ("entry.3", "a@b.co")]
        );

        let without_email = config(None);
        assert_eq!(without_email.form_fields(&record).len(), 2);
    }

    #[tokio::test]
    async fn test_listing_is_unsupported() {
        let sink = GoogleFormSink::new(config(None)).unwrap();
        assert!(matches!(
            sink.list().await,
            Err(FeedbackError::Unsupported("google-form"))
        ));
    }
}
