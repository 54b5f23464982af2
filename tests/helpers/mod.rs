//! Test helper utilities: scripted backend and virtual clock
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use payroll_upload::error::UploadError;
use payroll_upload::models::job::{LaunchResponse, StatusFetch};
use payroll_upload::models::upload::{PresignedLocation, UploadPeriod, ValidFile};
use payroll_upload::services::api::PayrollBackend;
use payroll_upload::services::clock::Clock;

/// In-memory backend that replays scripted responses and records calls.
///
/// Status responses are consumed in order; the last `Ok` response repeats
/// forever so "stuck" jobs need only one entry.
pub struct ScriptedBackend {
    pub location: Mutex<Option<Result<PresignedLocation, UploadError>>>,
    pub put_results: Mutex<VecDeque<Result<(), UploadError>>>,
    pub launch: Mutex<Option<Result<LaunchResponse, UploadError>>>,
    pub statuses: Mutex<VecDeque<Result<StatusFetch, UploadError>>>,
    pub direct: Mutex<Option<Result<Option<String>, UploadError>>>,
    pub calls: Mutex<Vec<String>>,
    pub status_job_ids: Mutex<Vec<String>>,
    pub sent_etags: Mutex<Vec<Option<String>>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            location: Mutex::new(None),
            put_results: Mutex::new(VecDeque::new()),
            launch: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            direct: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            status_job_ids: Mutex::new(Vec::new()),
            sent_etags: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presigned location, successful transfer and an accepted job.
    pub fn presigned_happy_path(job_id: &str) -> Self {
        let backend = Self::default();
        *backend.location.lock().unwrap() = Some(Ok(crate::fixtures::location(
            "https://storage.example.com/bucket/key?sig=abc",
        )));
        *backend.launch.lock().unwrap() = Some(Ok(LaunchResponse {
            message: Some("accepted".into()),
            job_id: Some(job_id.into()),
            status: Some("processing".into()),
        }));
        backend
    }

    pub fn with_statuses(self, statuses: Vec<StatusFetch>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into_iter().map(Ok).collect();
        self
    }

    pub fn push_status(&self, status: Result<StatusFetch, UploadError>) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn push_put(&self, result: Result<(), UploadError>) {
        self.put_results.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl PayrollBackend for ScriptedBackend {
    async fn request_location(
        &self,
        _period: UploadPeriod,
        _content_type: &str,
        _token: &str,
    ) -> Result<PresignedLocation, UploadError> {
        self.record("request_location");
        self.location
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(UploadError::Unknown("no location scripted".into())))
    }

    async fn put_object(&self, _upload_url: &str, _file: &ValidFile) -> Result<(), UploadError> {
        self.record("put_object");
        self.put_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn launch_processing(
        &self,
        _file_key: &str,
        _period: UploadPeriod,
        _token: &str,
    ) -> Result<LaunchResponse, UploadError> {
        self.record("launch_processing");
        self.launch
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(UploadError::Unknown("no launch scripted".into())))
    }

    async fn fetch_status(
        &self,
        job_id: &str,
        _token: &str,
        etag: Option<&str>,
    ) -> Result<StatusFetch, UploadError> {
        self.record("fetch_status");
        self.status_job_ids.lock().unwrap().push(job_id.to_string());
        self.sent_etags
            .lock()
            .unwrap()
            .push(etag.map(str::to_string));

        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() == 1 {
            if let Some(Ok(fetch)) = statuses.front() {
                return Ok(fetch.clone());
            }
        }
        statuses
            .pop_front()
            .unwrap_or_else(|| Err(UploadError::Unknown("no status scripted".into())))
    }

    async fn upload_direct(
        &self,
        _period: UploadPeriod,
        _file: &ValidFile,
        _token: &str,
    ) -> Result<Option<String>, UploadError> {
        self.record("upload_direct");
        self.direct.lock().unwrap().take().unwrap_or(Ok(None))
    }
}

/// Virtual clock: `sleep` advances time instantly and records the delay.
///
/// Only suitable where a single timer is awaited at a time (the poller on
/// its own); racing timers need a paused tokio runtime instead.
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}
