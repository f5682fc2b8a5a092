//! Download Gating
//!
//! A download is fulfilled when the session is entitled, or when the free
//! allowance is not used up yet. Only the free branch consumes allowance.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::session::SessionState;

/// File name offered to the browser
pub const DOWNLOAD_FILENAME: &str = "bls_photo.jpg";

/// MIME type of every download
pub const DOWNLOAD_CONTENT_TYPE: &str = "image/jpeg";

/// Why a download was allowed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum DownloadBasis {
    Entitled,
    FreeAllowance { remaining: u32 },
}

/// A permitted download
#[derive(Clone, PartialEq, Eq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub filename: &'static str,
    pub content_type: &'static str,
    pub basis: DownloadBasis,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("size_bytes", &self.bytes.len())
            .field("filename", &self.filename)
            .field("basis", &self.basis)
            .finish_non_exhaustive()
    }
}

/// Hand out the staged photo if the session may have it.
///
/// Run this inside [`SessionStore::update`](crate::SessionStore::update)
/// so the permission check and the counter increment happen together.
pub fn download(session: &mut SessionState, free_allowance: u32) -> Result<Download> {
    let Some(image) = session.image.as_ref() else {
        return Err(CoreError::NotFound(
            "No photo has been uploaded in this session.".into(),
        ));
    };

    let basis = if session.entitled {
        DownloadBasis::Entitled
    } else if session.free_downloads_used < free_allowance {
        DownloadBasis::FreeAllowance {
            remaining: free_allowance - session.free_downloads_used - 1,
        }
    } else {
        return Err(CoreError::Permission(
            "Free download already used. Complete payment to download again.".into(),
        ));
    };

    let bytes = image.bytes.clone();

    if let DownloadBasis::FreeAllowance { remaining } = basis {
        session.free_downloads_used += 1;
        tracing::info!(session = %session.id, remaining, "Free download consumed");
    }

    Ok(Download {
        bytes,
        filename: DOWNLOAD_FILENAME,
        content_type: DOWNLOAD_CONTENT_TYPE,
        basis,
    })
}
