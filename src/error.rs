use std::time::Duration;

/// Rejections raised before any network call is made.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Only {expected} files are accepted (got {actual})")]
    UnsupportedType { expected: String, actual: String },

    #[error("File name {name:?} must have a .{expected} extension")]
    WrongExtension { name: String, expected: String },

    #[error("File is {size} bytes, above the {max} byte limit")]
    TooLarge { size: u64, max: u64 },

    #[error("File is empty")]
    Empty,

    #[error("Invalid payroll period: {0}")]
    Period(String),
}

/// Every way an upload can fail, from local validation to job polling.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Storage denied the upload: {0}")]
    Permission(String),

    #[error("Upload link expired before the transfer completed")]
    ExpiredLocation,

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Upload failed after {attempts} attempts: {message}")]
    UploadExhausted {
        attempts: u32,
        last_status: Option<u16>,
        message: String,
    },

    #[error("Unexpected server response: {0}")]
    ServerContract(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Could not start processing: {0}")]
    Launch(String),

    #[error("Processing failed: {0}")]
    JobFailed(String),

    #[error("Invalid job status: {0:?}")]
    InvalidStatus(String),

    #[error("Processing stalled: {0}")]
    Stalled(String),

    #[error("Maximum number of status checks exceeded ({0})")]
    MaxAttemptsExceeded(u32),

    #[error("Processing time limit exceeded ({}s)", .0.as_secs())]
    Timeout(Duration),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Unknown(String),
}

impl UploadError {
    /// Transient failures: 5xx responses and transport faults.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Server { status, .. } => *status >= 500,
            UploadError::Transport(_) => true,
            _ => false,
        }
    }

    /// HTTP status observed when the error came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            UploadError::Server { status, .. } => Some(*status),
            UploadError::UploadExhausted { last_status, .. } => *last_status,
            UploadError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::Validation(_) => "validation",
            UploadError::Auth(_) => "auth",
            UploadError::Permission(_) | UploadError::ExpiredLocation => "permission",
            UploadError::Server { .. } | UploadError::Transport(_) => "transient",
            UploadError::UploadExhausted { .. } => "upload_exhausted",
            UploadError::ServerContract(_) | UploadError::InvalidStatus(_) => "server_contract",
            UploadError::NotFound(_) => "not_found",
            UploadError::Launch(_) => "launch",
            UploadError::JobFailed(_) => "job_failed",
            UploadError::Stalled(_) => "stalled",
            UploadError::MaxAttemptsExceeded(_) => "max_attempts",
            UploadError::Timeout(_) => "timeout",
            UploadError::Cancelled => "cancelled",
            UploadError::Unknown(_) => "unknown",
        }
    }

    /// Human-readable message, never empty.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            "Unknown error during upload".to_string()
        } else {
            message
        }
    }
}
