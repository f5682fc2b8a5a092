//! # snapvisa-feedback
//!
//! Append-only feedback collection for the snapvisa photo tool.
//!
//! ## Sinks
//!
//! - **Google Form** (default feature): posts to a form's `formResponse` URL
//! - **JSON file**: a local array file, written atomically
//!
//! ## Usage
//!
//! ```rust,ignore
//! use snapvisa_feedback::{submit, FeedbackConfig, FeedbackSubmission};
//!
//! let sink = FeedbackConfig::from_env()?.build_sink()?;
//! submit(sink.as_ref(), FeedbackSubmission::new("Asha", "Worked first try", None)).await?;
//! ```

mod config;
mod error;
mod json_file;
mod record;
mod sink;

#[cfg(feature = "google-form")]
mod google_form;

pub use config::FeedbackConfig;
pub use error::{FeedbackError, Result};
pub use json_file::JsonFileSink;
pub use record::{
    escape_markup, is_plausible_email, FeedbackRecord, FeedbackSubmission, MAX_MESSAGE_CHARS,
    MAX_NAME_CHARS,
};
pub use sink::{deliver, submit, FeedbackSink};

#[cfg(feature = "google-form")]
pub use google_form::{GoogleFormConfig, GoogleFormSink};
