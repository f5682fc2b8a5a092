//! # snapvisa-pipeline
//!
//! Turns an uploaded photo into a passport-ready JPEG.
//!
//! ## Example: BLS Canada
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  upload 1200x800 JPEG, 4.5 MB                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  resize_exact ──▶ 600x600                                   │
//! │  quality 95   ──▶ 310 KB  ✗ over 240 KB                     │
//! │  quality 90   ──▶ 262 KB  ✗                                 │
//! │  quality 80   ──▶ 190 KB  ✓ keep                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! If no quality on the ladder fits, the smallest encode is returned with
//! [`CompressionOutcome::OverBudget`]; the upload itself never fails on size.

pub mod error;
pub mod format;
pub mod pipeline;
pub mod preview;
pub mod spec;

pub use error::{PipelineError, Result};
pub use format::{extension_of, UploadFormat};
pub use pipeline::{
    compress_to_budget, encode_jpeg, process, CompressionOutcome, Compressed, EncodeAttempt,
    ProcessedImage,
};
pub use preview::{preview, Preview};
pub use spec::PhotoSpec;
