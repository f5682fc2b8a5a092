//! Local JSON File Sink
//!
//! Stores feedback as a single JSON array. Appends are read-modify-write, so
//! they are serialized behind a mutex owned by the sink; run exactly one sink
//! per file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{FeedbackError, Result};
use crate::record::FeedbackRecord;
use crate::sink::FeedbackSink;

/// JSON array file on local disk
pub struct JsonFileSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<FeedbackRecord>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage(&self.path, &e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|e| storage(&self.path, &e))
    }

    /// Write to a sibling temp file, then rename over the log.
    async fn write_all(&self, records: &[FeedbackRecord]) -> Result<()> {
        let json = serde_json::to_vec_pretty(records).map_err(|e| storage(&self.path, &e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage(&self.path, &e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| storage(&tmp, &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage(&self.path, &e))?;

        Ok(())
    }
}

#[async_trait]
impl FeedbackSink for JsonFileSink {
    fn name(&self) -> &'static str {
        "json-file"
    }

    async fn append(&self, record: &FeedbackRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_all().await?;
        records.push(record.clone());
        self.write_all(&records).await
    }

    async fn list(&self) -> Result<Vec<FeedbackRecord>> {
        let _guard = self.write_lock.lock().await;
        self.read_all().await
    }
}

fn storage(path: &Path, err: &dyn std::fmt::Display) -> FeedbackError {
    FeedbackError::Storage(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FeedbackSubmission;
    use crate::sink::submit;
    use std::sync::Arc;

    fn record(name: &str) -> FeedbackRecord {
        FeedbackSubmission::new(name, "Great tool", None)
            .into_record()
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("feedback.json"));
        assert!(sink.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("nested").join("feedback.json"));

        sink.append(&record("first")).await.unwrap();
        sink.append(&record("second")).await.unwrap();

        let names: Vec<String> = sink.list().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["first", "second"]);

        let raw = std::fs::read_to_string(sink.path()).unwrap();
        assert!(raw.trim_start().starts_with('['));
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(JsonFileSink::new(dir.path().join("feedback.json")));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let sink = sink.clone();
            tasks.push(tokio::spawn(async move {
                sink.append(&record(&format!("user-{i}"))).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(sink.list().await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.json");
        std::fs::write(&path, "{not json").unwrap();

        let sink = JsonFileSink::new(&path);
        let err = sink.append(&record("x")).await.unwrap_err();
        assert!(matches!(err, FeedbackError::Storage(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{not json");
    }

    #[tokio::test]
    async fn test_submit_validates_before_append() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("feedback.json"));

        let err = submit(&sink, FeedbackSubmission::new("", "hi", None))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedbackError::Validation(_)));
        assert!(sink.list().await.unwrap().is_empty());

        submit(&sink, FeedbackSubmission::new("Asha", "<3", None)).await.unwrap();
        assert_eq!(sink.list().await.unwrap()[0].message, "&lt;3");
    }
}
