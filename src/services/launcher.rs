use std::sync::Arc;
use tracing::info;

use crate::error::UploadError;
use crate::models::upload::UploadPeriod;
use crate::services::api::PayrollBackend;

/// Tells the backend a stored object is ready for processing.
pub struct ProcessingJobLauncher {
    backend: Arc<dyn PayrollBackend>,
}

impl ProcessingJobLauncher {
    pub fn new(backend: Arc<dyn PayrollBackend>) -> Self {
        Self { backend }
    }

    /// Start a processing job and return its id. Single attempt: launching
    /// twice would create two jobs.
    pub async fn launch(
        &self,
        file_key: &str,
        period: UploadPeriod,
        token: &str,
    ) -> Result<String, UploadError> {
        info!(file_key, year = period.year, month = period.month, "Starting processing job");

        let response = self
            .backend
            .launch_processing(file_key, period, token)
            .await?;

        let job_id = response
            .job_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                UploadError::ServerContract("server did not return a job id".to_string())
            })?;

        info!(%job_id, "Processing job accepted");
        Ok(job_id)
    }
}
