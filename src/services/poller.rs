use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollPolicy;
use crate::error::UploadError;
use crate::models::job::{normalize_job_id, JobState, ProcessingStatus, Progress, StatusFetch};
use crate::services::api::PayrollBackend;
use crate::services::clock::Clock;

/// Client-local bookkeeping for one polling run. Never shared between jobs.
#[derive(Debug, Clone)]
pub struct PollState {
    pub attempt: u32,
    pub delay: Duration,
    pub last_progress: Option<Progress>,
    /// When the progress value last changed, not when we last polled.
    pub last_change: Instant,
    pub unchanged_polls: u32,
    pub etag: Option<String>,
}

impl PollState {
    pub fn new(started: Instant, initial_delay: Duration) -> Self {
        Self {
            attempt: 0,
            delay: initial_delay,
            last_progress: None,
            last_change: started,
            unchanged_polls: 0,
            etag: None,
        }
    }

    /// Record a progress report. A missing value counts as unchanged.
    pub fn observe(&mut self, progress: Option<&Progress>, now: Instant) {
        match progress {
            Some(p) if self.last_progress.as_ref() != Some(p) => {
                self.last_progress = Some(p.clone());
                self.last_change = now;
                self.unchanged_polls = 0;
            }
            _ => self.unchanged_polls += 1,
        }
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_change)
    }
}

/// Polls a processing job until it completes, fails, or a limit trips.
///
/// One status request is in flight at a time: the loop awaits each response,
/// then sleeps for the adaptive delay before the next one.
pub struct JobStatusPoller {
    backend: Arc<dyn PayrollBackend>,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
}

impl JobStatusPoller {
    pub fn new(backend: Arc<dyn PayrollBackend>, clock: Arc<dyn Clock>, policy: PollPolicy) -> Self {
        Self {
            backend,
            clock,
            policy,
        }
    }

    /// Poll `job_id` to a terminal state.
    ///
    /// `on_progress` sees every `processing` snapshot. The returned result is
    /// the completion payload; every other exit is an error:
    /// - `JobFailed` when the server reports `error`/`failed`
    /// - `ServerContract` when `completed` arrives without a payload
    /// - `InvalidStatus` for an unrecognized status value
    /// - `Stalled`, `MaxAttemptsExceeded` or `Cancelled` from local limits
    pub async fn poll<F>(
        &self,
        job_id: &str,
        token: &str,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, UploadError>
    where
        F: FnMut(&ProcessingStatus) + Send,
    {
        let job_id = normalize_job_id(job_id);
        let mut state = PollState::new(self.clock.now(), self.policy.min_delay);

        loop {
            if state.attempt >= self.policy.max_attempts {
                warn!(job_id, attempts = state.attempt, "Giving up on job status checks");
                return Err(UploadError::MaxAttemptsExceeded(self.policy.max_attempts));
            }
            state.attempt += 1;
            metrics::counter!("payroll_status_checks_total").increment(1);

            debug!(
                job_id,
                attempt = state.attempt,
                max_attempts = self.policy.max_attempts,
                "Checking job status"
            );

            let fetch = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                fetched = self.backend.fetch_status(job_id, token, state.etag.as_deref()) => fetched?,
            };
            let now = self.clock.now();

            match fetch {
                StatusFetch::NotModified => {
                    debug!(job_id, "Status unchanged since last check");
                }
                StatusFetch::Snapshot { status, etag } => {
                    if etag.is_some() {
                        state.etag = etag;
                    }

                    match status.state() {
                        Ok(JobState::Completed) => {
                            return match status.result {
                                Some(result) => {
                                    info!(job_id, attempts = state.attempt, "Job completed");
                                    Ok(result)
                                }
                                None => Err(UploadError::ServerContract(
                                    "job reported completed without a result".to_string(),
                                )),
                            };
                        }
                        Ok(JobState::Error) => {
                            let message = status
                                .error
                                .or(status.message)
                                .filter(|m| !m.trim().is_empty())
                                .unwrap_or_else(|| "processing error".to_string());
                            warn!(job_id, %message, "Job failed on the server");
                            return Err(UploadError::JobFailed(message));
                        }
                        Err(_) => return Err(UploadError::InvalidStatus(status.status)),
                        Ok(JobState::Processing) => {
                            state.observe(status.progress.as_ref(), now);
                            on_progress(&status);
                            state.delay = self.next_delay(&status, &state);
                        }
                    }
                }
            }

            self.check_stall(&state, now)?;

            debug!(
                job_id,
                delay_ms = state.delay.as_millis() as u64,
                unchanged = state.unchanged_polls,
                "Next status check scheduled"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = self.clock.sleep(state.delay) => {}
            }
        }
    }

    /// Adaptive delay before the next check.
    ///
    /// A server `retryDelay` hint wins as-is. Otherwise the current delay grows
    /// by the backoff multiplier while progress is unchanged or at/below the
    /// low-progress mark, grows again during known slow steps, and is held
    /// within `[min_delay, max_delay]`.
    pub fn next_delay(&self, status: &ProcessingStatus, state: &PollState) -> Duration {
        if let Some(hint) = status.retry_delay.filter(|s| s.is_finite() && *s > 0.0) {
            // Out-of-range hints fall back to the slowest regular cadence
            return Duration::try_from_secs_f64(hint).unwrap_or(self.policy.max_delay);
        }

        let mut factor = 1.0;
        let low = status
            .percent()
            .is_some_and(|p| p <= self.policy.low_progress_percent);
        if state.unchanged_polls > 0 || low {
            factor *= self.policy.backoff_multiplier;
        }
        if self.is_slow_phase(status.current_step.as_deref()) {
            factor *= self.policy.slow_phase_multiplier;
        }

        let scaled = state.delay.mul_f64(factor.max(1.0));
        scaled.clamp(self.policy.min_delay, self.policy.max_delay)
    }

    fn is_slow_phase(&self, step: Option<&str>) -> bool {
        let Some(step) = step else {
            return false;
        };
        let step = step.to_lowercase();
        self.policy
            .slow_phase_markers
            .iter()
            .any(|marker| step.contains(marker.as_str()))
    }

    fn check_stall(&self, state: &PollState, now: Instant) -> Result<(), UploadError> {
        let idle = state.idle_for(now);
        if idle > self.policy.stall_timeout {
            warn!(idle_secs = idle.as_secs(), "No progress change, aborting");
            return Err(UploadError::Stalled(format!(
                "no progress for {} seconds",
                idle.as_secs()
            )));
        }

        if let Some(max) = self.policy.max_unchanged_polls {
            if state.unchanged_polls >= max {
                warn!(unchanged = state.unchanged_polls, "Progress frozen, aborting");
                return Err(UploadError::Stalled(format!(
                    "progress unchanged for {} consecutive checks",
                    state.unchanged_polls
                )));
            }
        }
        Ok(())
    }
}
