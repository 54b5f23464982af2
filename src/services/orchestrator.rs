use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::config::{AppConfig, OrchestratorPolicy, PollPolicy, TransferPolicy, ValidationPolicy};
use crate::error::UploadError;
use crate::models::job::ProcessingStatus;
use crate::models::upload::{UploadOutcome, UploadRequest, UploadRoute, ValidFile};
use crate::services::api::PayrollBackend;
use crate::services::clock::Clock;
use crate::services::launcher::ProcessingJobLauncher;
use crate::services::poller::JobStatusPoller;
use crate::services::presigned::PresignedUploadClient;
use crate::services::router::SizeRouter;
use crate::services::validator::FileValidator;

const DIRECT_SUCCESS_MESSAGE: &str = "File uploaded successfully";
const PROCESSED_SUCCESS_MESSAGE: &str = "Upload and processing completed successfully";

/// Successful end of an orchestration, before it is flattened to an outcome.
struct Completed {
    message: String,
    job_id: Option<String>,
    result: Option<serde_json::Value>,
}

/// Single entry point for a payroll upload:
/// validate → route → (presigned transfer → launch → poll) or direct submit.
pub struct UploadOrchestrator {
    validator: FileValidator,
    router: SizeRouter,
    uploader: PresignedUploadClient,
    launcher: ProcessingJobLauncher,
    poller: JobStatusPoller,
    backend: Arc<dyn PayrollBackend>,
    clock: Arc<dyn Clock>,
    policy: OrchestratorPolicy,
}

impl UploadOrchestrator {
    pub fn new(backend: Arc<dyn PayrollBackend>, clock: Arc<dyn Clock>, config: &AppConfig) -> Self {
        Self::with_policies(
            backend,
            clock,
            config.validation_policy(),
            config.transfer_policy(),
            config.poll_policy(),
            config.orchestrator_policy(),
        )
    }

    pub fn with_policies(
        backend: Arc<dyn PayrollBackend>,
        clock: Arc<dyn Clock>,
        validation: ValidationPolicy,
        transfer: TransferPolicy,
        poll: PollPolicy,
        policy: OrchestratorPolicy,
    ) -> Self {
        Self {
            router: SizeRouter::new(validation.presigned_threshold),
            validator: FileValidator::new(validation),
            uploader: PresignedUploadClient::new(backend.clone(), clock.clone(), transfer),
            launcher: ProcessingJobLauncher::new(backend.clone()),
            poller: JobStatusPoller::new(backend.clone(), clock.clone(), poll),
            backend,
            clock,
            policy,
        }
    }

    /// Run one upload to completion. Never fails: every error becomes an
    /// outcome with `success == false` and a non-empty message.
    ///
    /// Progress is reported on the presigned path only. Cancelling `cancel`
    /// stops the status loop at its next suspension point.
    pub async fn upload<F>(
        &self,
        request: UploadRequest,
        token: &str,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> UploadOutcome
    where
        F: FnMut(&ProcessingStatus) + Send,
    {
        let span = tracing::info_span!(
            "upload",
            upload_id = %Uuid::new_v4(),
            year = request.period.year,
            month = request.period.month,
        );

        async move {
            let mut job_id = None;
            let settled = self
                .run(request, token, on_progress, cancel, &mut job_id)
                .await;
            match settled {
                Ok(done) => {
                    info!(job_id = ?done.job_id, "Upload finished");
                    UploadOutcome {
                        success: true,
                        message: done.message,
                        job_id: done.job_id,
                        result: done.result,
                    }
                }
                Err(e) => {
                    error!(kind = e.kind(), error = %e, job_id = ?job_id, "Upload failed");
                    metrics::counter!("payroll_uploads_failed_total", "kind" => e.kind())
                        .increment(1);
                    UploadOutcome {
                        success: false,
                        message: e.user_message(),
                        job_id,
                        result: None,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run<F>(
        &self,
        request: UploadRequest,
        token: &str,
        on_progress: F,
        cancel: &CancellationToken,
        job_id_slot: &mut Option<String>,
    ) -> Result<Completed, UploadError>
    where
        F: FnMut(&ProcessingStatus) + Send,
    {
        // ── Local checks: nothing below this block runs on bad input ────
        self.validator.validate_period(&request.period)?;
        let file = self.validator.validate(&request.file)?;
        if token.trim().is_empty() {
            return Err(UploadError::Auth(
                "no session token; log in before uploading".to_string(),
            ));
        }

        let route = self.router.route(&file);
        info!(%route, size = file.byte_size(), name = %file.name, "Upload routed");
        metrics::counter!("payroll_uploads_total", "route" => route.to_string()).increment(1);

        match route {
            UploadRoute::Direct => self.upload_direct(&request, &file, token).await,
            UploadRoute::Presigned => {
                self.upload_presigned(&request, &file, token, on_progress, cancel, job_id_slot)
                    .await
            }
        }
    }

    async fn upload_direct(
        &self,
        request: &UploadRequest,
        file: &ValidFile,
        token: &str,
    ) -> Result<Completed, UploadError> {
        let message = self
            .backend
            .upload_direct(request.period, file, token)
            .await?;
        Ok(Completed {
            message: message.unwrap_or_else(|| DIRECT_SUCCESS_MESSAGE.to_string()),
            job_id: None,
            result: None,
        })
    }

    async fn upload_presigned<F>(
        &self,
        request: &UploadRequest,
        file: &ValidFile,
        token: &str,
        on_progress: F,
        cancel: &CancellationToken,
        job_id_slot: &mut Option<String>,
    ) -> Result<Completed, UploadError>
    where
        F: FnMut(&ProcessingStatus) + Send,
    {
        let location = self
            .uploader
            .request_location(request.period, &file.mime_type, token)
            .await?;
        self.uploader.transfer(&location, file).await?;

        let job_id = self
            .launcher
            .launch(&location.file_key, request.period, token)
            .await?;
        *job_id_slot = Some(job_id.clone());

        // The ceiling runs beside the poller's own stall and attempt limits.
        // Whichever side finishes first settles the upload; the loser is
        // dropped, so no callback can fire afterwards.
        let result = tokio::select! {
            polled = self.poller.poll(&job_id, token, on_progress, cancel) => polled?,
            _ = self.clock.sleep(self.policy.global_timeout) => {
                return Err(UploadError::Timeout(self.policy.global_timeout));
            }
        };

        Ok(Completed {
            message: PROCESSED_SUCCESS_MESSAGE.to_string(),
            job_id: Some(job_id),
            result: Some(result),
        })
    }
}
