use serde::Deserialize;
use std::time::Duration;

/// Accepted document type for payroll batches.
pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const PDF_EXTENSION: &str = "pdf";

/// Absolute upload cap (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Files strictly above this size go through a presigned URL (4 MiB).
pub const DEFAULT_PRESIGNED_THRESHOLD: u64 = 4 * 1024 * 1024;

pub const DEFAULT_TRANSFER_ATTEMPTS: u32 = 3;
pub const DEFAULT_TRANSFER_RETRY_DELAY_MS: u64 = 1_000;

pub const DEFAULT_POLL_MIN_DELAY_MS: u64 = 3_000;
pub const DEFAULT_POLL_MAX_DELAY_MS: u64 = 15_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_SLOW_PHASE_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_LOW_PROGRESS_PERCENT: f64 = 10.0;
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 100;
pub const DEFAULT_STALL_TIMEOUT_SECS: u64 = 5 * 60;
pub const DEFAULT_MAX_UNCHANGED_POLLS: u32 = 10;
pub const DEFAULT_GLOBAL_TIMEOUT_SECS: u64 = 5 * 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Process configuration, read from `PAYROLL_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Backend base URL (e.g., "https://api.example.com").
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Session token. Usually supplied by the login flow; optional here.
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default = "default_presigned_threshold")]
    pub presigned_threshold: u64,

    #[serde(default = "default_transfer_attempts")]
    pub transfer_attempts: u32,

    #[serde(default = "default_transfer_retry_delay_ms")]
    pub transfer_retry_delay_ms: u64,

    #[serde(default = "default_poll_min_delay_ms")]
    pub poll_min_delay_ms: u64,

    #[serde(default = "default_poll_max_delay_ms")]
    pub poll_max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_slow_phase_multiplier")]
    pub slow_phase_multiplier: f64,

    #[serde(default = "default_low_progress_percent")]
    pub low_progress_percent: f64,

    /// Comma-separated step labels known to be slow.
    #[serde(default = "default_slow_phase_markers")]
    pub slow_phase_markers: Vec<String>,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,

    /// 0 disables the consecutive-unchanged guard.
    #[serde(default = "default_max_unchanged_polls")]
    pub max_unchanged_polls: u32,

    #[serde(default = "default_global_timeout_secs")]
    pub global_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_presigned_threshold() -> u64 {
    DEFAULT_PRESIGNED_THRESHOLD
}

fn default_transfer_attempts() -> u32 {
    DEFAULT_TRANSFER_ATTEMPTS
}

fn default_transfer_retry_delay_ms() -> u64 {
    DEFAULT_TRANSFER_RETRY_DELAY_MS
}

fn default_poll_min_delay_ms() -> u64 {
    DEFAULT_POLL_MIN_DELAY_MS
}

fn default_poll_max_delay_ms() -> u64 {
    DEFAULT_POLL_MAX_DELAY_MS
}

fn default_backoff_multiplier() -> f64 {
    DEFAULT_BACKOFF_MULTIPLIER
}

fn default_slow_phase_multiplier() -> f64 {
    DEFAULT_SLOW_PHASE_MULTIPLIER
}

fn default_low_progress_percent() -> f64 {
    DEFAULT_LOW_PROGRESS_PERCENT
}

fn default_slow_phase_markers() -> Vec<String> {
    vec!["extracting pages".to_string()]
}

fn default_max_poll_attempts() -> u32 {
    DEFAULT_MAX_POLL_ATTEMPTS
}

fn default_stall_timeout_secs() -> u64 {
    DEFAULT_STALL_TIMEOUT_SECS
}

fn default_max_unchanged_polls() -> u32 {
    DEFAULT_MAX_UNCHANGED_POLLS
}

fn default_global_timeout_secs() -> u64 {
    DEFAULT_GLOBAL_TIMEOUT_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_token: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            presigned_threshold: DEFAULT_PRESIGNED_THRESHOLD,
            transfer_attempts: DEFAULT_TRANSFER_ATTEMPTS,
            transfer_retry_delay_ms: DEFAULT_TRANSFER_RETRY_DELAY_MS,
            poll_min_delay_ms: DEFAULT_POLL_MIN_DELAY_MS,
            poll_max_delay_ms: DEFAULT_POLL_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            slow_phase_multiplier: DEFAULT_SLOW_PHASE_MULTIPLIER,
            low_progress_percent: DEFAULT_LOW_PROGRESS_PERCENT,
            slow_phase_markers: default_slow_phase_markers(),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            stall_timeout_secs: DEFAULT_STALL_TIMEOUT_SECS,
            max_unchanged_polls: DEFAULT_MAX_UNCHANGED_POLLS,
            global_timeout_secs: DEFAULT_GLOBAL_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed("PAYROLL_").from_env()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            max_file_size: self.max_file_size,
            presigned_threshold: self.presigned_threshold,
            ..ValidationPolicy::default()
        }
    }

    pub fn transfer_policy(&self) -> TransferPolicy {
        TransferPolicy {
            max_attempts: self.transfer_attempts.max(1),
            retry_delay: Duration::from_millis(self.transfer_retry_delay_ms),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            min_delay: Duration::from_millis(self.poll_min_delay_ms),
            max_delay: Duration::from_millis(self.poll_max_delay_ms.max(self.poll_min_delay_ms)),
            backoff_multiplier: self.backoff_multiplier,
            slow_phase_multiplier: self.slow_phase_multiplier,
            low_progress_percent: self.low_progress_percent,
            slow_phase_markers: self
                .slow_phase_markers
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            max_attempts: self.max_poll_attempts,
            stall_timeout: Duration::from_secs(self.stall_timeout_secs),
            max_unchanged_polls: (self.max_unchanged_polls > 0).then_some(self.max_unchanged_polls),
        }
    }

    pub fn orchestrator_policy(&self) -> OrchestratorPolicy {
        OrchestratorPolicy {
            global_timeout: Duration::from_secs(self.global_timeout_secs),
        }
    }
}

/// File acceptance rules and the direct/presigned routing threshold.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub accepted_mime_type: String,
    pub accepted_extension: String,
    pub max_file_size: u64,
    pub presigned_threshold: u64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            accepted_mime_type: PDF_MIME_TYPE.to_string(),
            accepted_extension: PDF_EXTENSION.to_string(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            presigned_threshold: DEFAULT_PRESIGNED_THRESHOLD,
        }
    }
}

/// Retry rules for the byte transfer to a presigned URL.
#[derive(Debug, Clone)]
pub struct TransferPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_TRANSFER_ATTEMPTS,
            retry_delay: Duration::from_millis(DEFAULT_TRANSFER_RETRY_DELAY_MS),
        }
    }
}

/// Backoff, stall and attempt limits for job status polling.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub slow_phase_multiplier: f64,
    /// Progress at or below this percentage counts as "stuck low".
    pub low_progress_percent: f64,
    /// Lowercase substrings matched against `currentStep`.
    pub slow_phase_markers: Vec<String>,
    pub max_attempts: u32,
    /// Maximum wall-clock time without a progress change.
    pub stall_timeout: Duration,
    /// Maximum consecutive reports with identical progress.
    pub max_unchanged_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        AppConfig::default().poll_policy()
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorPolicy {
    /// Ceiling on the whole processing wait, independent of poll limits.
    pub global_timeout: Duration,
}

impl Default for OrchestratorPolicy {
    fn default() -> Self {
        Self {
            global_timeout: Duration::from_secs(DEFAULT_GLOBAL_TIMEOUT_SECS),
        }
    }
}
