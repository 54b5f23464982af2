use bytes::Bytes;
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strum::{Display, EnumString};
use tokio::time::Instant;

use crate::config::{PDF_EXTENSION, PDF_MIME_TYPE};

/// Payroll month a batch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UploadPeriod {
    #[garde(range(min = 2000, max = 2100))]
    pub year: i32,

    #[garde(range(min = 1, max = 12))]
    pub month: u32,
}

/// A candidate payroll document as picked by the user.
#[derive(Debug, Clone)]
pub struct PayrollFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl PayrollFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    ///
    /// Reads the whole file; callers holding a size cap should check
    /// `tokio::fs::metadata` first (see `FileValidator::check_size`).
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_type_for(&name).to_string();
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

fn mime_type_for(name: &str) -> &'static str {
    let is_pdf = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(PDF_EXTENSION));
    if is_pdf {
        PDF_MIME_TYPE
    } else {
        "application/octet-stream"
    }
}

/// One submission: constructed at submit time, consumed by a single upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub period: UploadPeriod,
    pub file: PayrollFile,
}

/// A file that passed validation, carrying its sanitized name.
#[derive(Debug, Clone)]
pub struct ValidFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl ValidFile {
    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// How a validated file reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum UploadRoute {
    /// Single multipart form submission.
    Direct,
    /// Write straight to object storage through a presigned URL.
    Presigned,
}

/// Write location minted by the backend for one presigned transfer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedLocation {
    pub upload_url: String,
    pub file_key: String,
    /// Validity window in seconds; 0 when the server did not say.
    #[serde(default)]
    pub expires_in: u64,
    #[serde(skip)]
    pub issued_at: Option<Instant>,
}

impl PresignedLocation {
    pub fn expires_at(&self) -> Option<Instant> {
        match (self.issued_at, self.expires_in) {
            (Some(issued), secs) if secs > 0 => Some(issued + Duration::from_secs(secs)),
            _ => None,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at().is_some_and(|deadline| now >= deadline)
    }
}

/// Settled result of one orchestration, as handed back to the UI layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}
