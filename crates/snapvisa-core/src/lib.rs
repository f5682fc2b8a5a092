//! # snapvisa-core
//!
//! Per-visitor state for the passport photo service.
//!
//! ## Session lifecycle
//!
//! ```text
//! ┌──────────┐ upload ┌──────────┐ checkout ┌──────────┐ verified ┌──────────┐
//! │  fresh   │───────▶│  staged  │─────────▶│ pending  │─────────▶│ entitled │
//! └──────────┘        └──────────┘          └──────────┘ callback └──────────┘
//!                          │ 1 free download                           │
//!                          ▼                                           ▼
//!                     download ok, then 403 until paid          unlimited downloads
//! ```
//!
//! Every state-changing request must present the session's current
//! [`AntiForgeryToken`], which is then rotated.

pub mod download;
pub mod error;
pub mod session;
pub mod token;

pub use download::{download, Download, DownloadBasis, DOWNLOAD_CONTENT_TYPE, DOWNLOAD_FILENAME};
pub use error::{CoreError, Result};
pub use session::{MemorySessionStore, PendingCheckout, SessionId, SessionState, SessionStore};
pub use token::AntiForgeryToken;
