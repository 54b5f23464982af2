use std::sync::Arc;
use tracing::{info, warn};

use crate::config::TransferPolicy;
use crate::error::UploadError;
use crate::models::upload::{PresignedLocation, UploadPeriod, ValidFile};
use crate::services::api::PayrollBackend;
use crate::services::clock::Clock;

/// Obtains a presigned write location and pushes the file bytes to it.
pub struct PresignedUploadClient {
    backend: Arc<dyn PayrollBackend>,
    clock: Arc<dyn Clock>,
    policy: TransferPolicy,
}

impl PresignedUploadClient {
    pub fn new(backend: Arc<dyn PayrollBackend>, clock: Arc<dyn Clock>, policy: TransferPolicy) -> Self {
        Self {
            backend,
            clock,
            policy,
        }
    }

    /// Ask the backend for a write location. Never retried: every call mints
    /// a new file key.
    pub async fn request_location(
        &self,
        period: UploadPeriod,
        content_type: &str,
        token: &str,
    ) -> Result<PresignedLocation, UploadError> {
        let mut location = self
            .backend
            .request_location(period, content_type, token)
            .await?;

        if location.upload_url.trim().is_empty() || location.file_key.trim().is_empty() {
            return Err(UploadError::ServerContract(
                "presigned-url response is missing uploadUrl or fileKey".to_string(),
            ));
        }

        location.issued_at = Some(self.clock.now());
        info!(
            file_key = %location.file_key,
            expires_in = location.expires_in,
            "Received presigned upload location"
        );
        Ok(location)
    }

    /// Write the file to the presigned location.
    ///
    /// 5xx responses and transport faults are retried with a fixed delay up to
    /// `max_attempts` total attempts; a 403 (bad or expired signature) and any
    /// other status fail immediately.
    pub async fn transfer(
        &self,
        location: &PresignedLocation,
        file: &ValidFile,
    ) -> Result<(), UploadError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error: Option<UploadError> = None;

        for attempt in 1..=max_attempts {
            if location.is_expired(self.clock.now()) {
                return Err(UploadError::ExpiredLocation);
            }

            info!(attempt, max_attempts, size = file.byte_size(), "Uploading to storage");

            match self.backend.put_object(&location.upload_url, file).await {
                Ok(()) => {
                    info!(attempt, file_key = %location.file_key, "Storage upload complete");
                    return Ok(());
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, error = %e, "Transient storage failure");
                    last_error = Some(e);
                    if attempt < max_attempts {
                        metrics::counter!("payroll_transfer_retries_total").increment(1);
                        self.clock.sleep(self.policy.retry_delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let (last_status, message) = match last_error {
            Some(e) => (e.status_code(), e.to_string()),
            None => (None, "no attempt was made".to_string()),
        };
        Err(UploadError::UploadExhausted {
            attempts: max_attempts,
            last_status,
            message,
        })
    }
}
