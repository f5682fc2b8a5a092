//! Sink Selection

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::json_file::JsonFileSink;
use crate::sink::FeedbackSink;

#[cfg(feature = "google-form")]
use crate::google_form::{GoogleFormConfig, GoogleFormSink};

const DEFAULT_FEEDBACK_FILE: &str = "feedback.json";

/// Which sink receives feedback
#[derive(Clone, Debug)]
pub enum FeedbackConfig {
    #[cfg(feature = "google-form")]
    GoogleForm(GoogleFormConfig),
    JsonFile(PathBuf),
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self::JsonFile(PathBuf::from(DEFAULT_FEEDBACK_FILE))
    }
}

impl FeedbackConfig {
    /// A configured Google Form wins; otherwise `FEEDBACK_FILE` (or
    /// `feedback.json`) in the working directory.
    pub fn from_env() -> Result<Self> {
        #[cfg(feature = "google-form")]
        if let Some(form) = GoogleFormConfig::from_env()? {
            return Ok(Self::GoogleForm(form));
        }

        Ok(std::env::var("FEEDBACK_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(Self::default, |path| Self::JsonFile(PathBuf::from(path))))
    }

    pub fn build_sink(self) -> Result<Arc<dyn FeedbackSink>> {
        let sink: Arc<dyn FeedbackSink> = match self {
            #[cfg(feature = "google-form")]
            Self::GoogleForm(form) => {
                tracing::info!(url = %form.url, "Feedback goes to Google Form");
                Arc::new(GoogleFormSink::new(form)?)
            }
            Self::JsonFile(path) => {
                tracing::info!(path = %path.display(), "Feedback goes to local JSON file");
                Arc::new(JsonFileSink::new(path))
            }
        };
        Ok(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_file_sink_is_built() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FeedbackConfig::JsonFile(dir.path().join("fb.json"))
            .build_sink()
            .unwrap();
        assert_eq!(sink.name(), "json-file");
        assert!(sink.list().await.unwrap().is_empty());
    }
}
