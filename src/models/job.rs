use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Prefix some backend revisions put in front of job ids.
const JOB_ID_PREFIX: &str = "process:";

/// Lifecycle of a backend processing job. `Completed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    Processing,
    Completed,
    #[strum(to_string = "error", serialize = "failed")]
    Error,
}

/// Chunk/page counters reported by the newer processing backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkProgress {
    #[serde(default)]
    pub current_chunk: u32,
    #[serde(default)]
    pub total_chunks: u32,
    #[serde(default)]
    pub pages_processed: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// Progress as either a plain percentage or structured counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Progress {
    Percent(f64),
    Chunked(ChunkProgress),
}

impl Progress {
    /// Completion percentage in `0.0..=100.0`. Pages win over chunks.
    pub fn percent(&self) -> f64 {
        let raw = match self {
            Progress::Percent(p) => *p,
            Progress::Chunked(c) if c.total_pages > 0 => {
                f64::from(c.pages_processed) / f64::from(c.total_pages) * 100.0
            }
            Progress::Chunked(c) if c.total_chunks > 0 => {
                f64::from(c.current_chunk) / f64::from(c.total_chunks) * 100.0
            }
            Progress::Chunked(_) => 0.0,
        };
        if raw.is_finite() {
            raw.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

/// Render a percentage the way the dashboard shows it, e.g. `"42%"`.
pub fn format_progress(percent: f64) -> String {
    format!("{}%", percent.round() as i64)
}

/// One snapshot of a job as returned by the status endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    #[serde(default)]
    pub status: String,
    pub job_id: Option<String>,
    pub message: Option<String>,
    pub progress: Option<Progress>,
    pub current_step: Option<String>,
    pub started_at: Option<String>,
    pub last_updated: Option<String>,
    pub timeout_at: Option<String>,
    pub attempts: Option<u32>,
    pub max_attempts: Option<u32>,
    /// Server hint for the next check, in seconds.
    pub retry_delay: Option<f64>,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
}

impl ProcessingStatus {
    pub fn state(&self) -> Result<JobState, strum::ParseError> {
        self.status.trim().to_lowercase().parse()
    }

    pub fn percent(&self) -> Option<f64> {
        self.progress.as_ref().map(Progress::percent)
    }
}

/// Outcome of a (possibly conditional) status fetch.
#[derive(Debug, Clone)]
pub enum StatusFetch {
    Snapshot {
        status: ProcessingStatus,
        etag: Option<String>,
    },
    /// 304: nothing changed since the entity tag we sent.
    NotModified,
}

/// Body of the 202 returned when a processing job is accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResponse {
    pub message: Option<String>,
    pub job_id: Option<String>,
    pub status: Option<String>,
}

/// Strip the `process:` prefix so the id can be used in a status path.
pub fn normalize_job_id(job_id: &str) -> &str {
    let trimmed = job_id.trim();
    trimmed.strip_prefix(JOB_ID_PREFIX).unwrap_or(trimmed)
}
