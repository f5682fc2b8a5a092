//! Feedback Sink Strategy
//!
//! A sink is an append-only log. Appends may fail; callers treat feedback as
//! best-effort and never let a sink failure affect the photo flow.

use async_trait::async_trait;

use crate::error::{FeedbackError, Result};
use crate::record::{FeedbackRecord, FeedbackSubmission};

/// Durable, append-only destination for feedback
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Append one record
    async fn append(&self, record: &FeedbackRecord) -> Result<()>;

    /// All stored records, oldest first
    async fn list(&self) -> Result<Vec<FeedbackRecord>> {
        Err(FeedbackError::Unsupported(self.name()))
    }
}

/// Validate a submission and append it to `sink`.
pub async fn submit(sink: &dyn FeedbackSink, submission: FeedbackSubmission) -> Result<FeedbackRecord> {
    let record = submission.into_record()?;
    deliver(sink, &record).await?;
    Ok(record)
}

/// Append an already validated record to `sink`, logging the outcome.
pub async fn deliver(sink: &dyn FeedbackSink, record: &FeedbackRecord) -> Result<()> {
    sink.append(record).await.map_err(|e| {
        tracing::error!(sink = sink.name(), error = %e, "Feedback append failed");
        e
    })?;

    tracing::info!(
        sink = sink.name(),
        message_chars = record.message.chars().count(),
        has_email = record.email.is_some(),
        "Feedback stored"
    );

    Ok(())
}
