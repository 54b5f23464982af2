use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use reqwest::multipart;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::UploadError;
use crate::models::job::{LaunchResponse, ProcessingStatus, StatusFetch};
use crate::models::upload::{PresignedLocation, UploadPeriod, ValidFile};

/// Backend calls the upload pipeline depends on.
///
/// Each method is a single attempt; retry policy lives in the callers.
#[async_trait]
pub trait PayrollBackend: Send + Sync {
    /// POST /presigned-url
    async fn request_location(
        &self,
        period: UploadPeriod,
        content_type: &str,
        token: &str,
    ) -> Result<PresignedLocation, UploadError>;

    /// PUT raw bytes to a presigned URL (no auth header; the URL is signed).
    async fn put_object(&self, upload_url: &str, file: &ValidFile) -> Result<(), UploadError>;

    /// POST /process-s3-upload, expecting 202 Accepted.
    async fn launch_processing(
        &self,
        file_key: &str,
        period: UploadPeriod,
        token: &str,
    ) -> Result<LaunchResponse, UploadError>;

    /// GET /process-s3-upload/status/{job_id}, conditional on `etag` when given.
    async fn fetch_status(
        &self,
        job_id: &str,
        token: &str,
        etag: Option<&str>,
    ) -> Result<StatusFetch, UploadError>;

    /// POST /upload/payroll as multipart form. Returns the server's message, if any.
    async fn upload_direct(
        &self,
        period: UploadPeriod,
        file: &ValidFile,
        token: &str,
    ) -> Result<Option<String>, UploadError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PresignedUrlRequest<'a> {
    year: i32,
    month: u32,
    content_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessUploadRequest<'a> {
    file_key: &'a str,
    year: i32,
    month: u32,
}

#[derive(Deserialize, Default)]
struct MessageBody {
    message: Option<String>,
    error: Option<String>,
}

/// reqwest implementation of [`PayrollBackend`].
#[derive(Clone, Debug)]
pub struct PayrollApiClient {
    http: Client,
    base_url: String,
}

impl PayrollApiClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, UploadError> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Pull a readable message out of an error response, falling back to the
/// status reason so the result is never empty.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: MessageBody = serde_json::from_str(&text).unwrap_or_default();

    body.message
        .or(body.error)
        .filter(|m| !m.trim().is_empty())
        .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        })
}

#[async_trait]
impl PayrollBackend for PayrollApiClient {
    async fn request_location(
        &self,
        period: UploadPeriod,
        content_type: &str,
        token: &str,
    ) -> Result<PresignedLocation, UploadError> {
        let response = self
            .http
            .post(self.url("/presigned-url"))
            .bearer_auth(token)
            .json(&PresignedUrlRequest {
                year: period.year,
                month: period.month,
                content_type,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(UploadError::Auth(error_message(response).await));
        }
        if !status.is_success() {
            return Err(UploadError::Server {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        response.json::<PresignedLocation>().await.map_err(|e| {
            UploadError::ServerContract(format!("invalid presigned-url response: {e}"))
        })
    }

    async fn put_object(&self, upload_url: &str, file: &ValidFile) -> Result<(), UploadError> {
        let response = self
            .http
            .put(upload_url)
            .header(CONTENT_TYPE, file.mime_type.as_str())
            .body(file.bytes.clone())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = error_message(response).await;
        debug!(status = status.as_u16(), %message, "Storage rejected transfer");

        if status == StatusCode::FORBIDDEN {
            return Err(UploadError::Permission(message));
        }
        Err(UploadError::Server {
            status: status.as_u16(),
            message,
        })
    }

    async fn launch_processing(
        &self,
        file_key: &str,
        period: UploadPeriod,
        token: &str,
    ) -> Result<LaunchResponse, UploadError> {
        let response = self
            .http
            .post(self.url("/process-s3-upload"))
            .bearer_auth(token)
            .json(&ProcessUploadRequest {
                file_key,
                year: period.year,
                month: period.month,
            })
            .send()
            .await
            .map_err(|e| UploadError::Launch(e.to_string()))?;

        match response.status() {
            StatusCode::ACCEPTED => response.json::<LaunchResponse>().await.map_err(|e| {
                UploadError::ServerContract(format!("invalid process-s3-upload response: {e}"))
            }),
            StatusCode::UNAUTHORIZED => Err(UploadError::Auth(error_message(response).await)),
            StatusCode::NOT_FOUND => Err(UploadError::NotFound(
                "processing endpoint not found; check the server configuration".to_string(),
            )),
            status if status.is_success() => Err(UploadError::ServerContract(format!(
                "expected 202 Accepted from process-s3-upload, got {status}"
            ))),
            _ => Err(UploadError::Launch(error_message(response).await)),
        }
    }

    async fn fetch_status(
        &self,
        job_id: &str,
        token: &str,
        etag: Option<&str>,
    ) -> Result<StatusFetch, UploadError> {
        let mut request = self
            .http
            .get(self.url(&format!("/process-s3-upload/status/{job_id}")))
            .bearer_auth(token);
        if let Some(tag) = etag {
            request = request.header(IF_NONE_MATCH, tag);
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            StatusCode::NOT_MODIFIED => Ok(StatusFetch::NotModified),
            StatusCode::NOT_FOUND => Err(UploadError::NotFound(format!("job {job_id} not found"))),
            StatusCode::UNAUTHORIZED => Err(UploadError::Auth(error_message(response).await)),
            s if s.is_success() => {
                let etag = response
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let snapshot = response.json::<ProcessingStatus>().await.map_err(|e| {
                    UploadError::ServerContract(format!("invalid status response: {e}"))
                })?;
                Ok(StatusFetch::Snapshot {
                    status: snapshot,
                    etag,
                })
            }
            s => Err(UploadError::Server {
                status: s.as_u16(),
                message: error_message(response).await,
            }),
        }
    }

    async fn upload_direct(
        &self,
        period: UploadPeriod,
        file: &ValidFile,
        token: &str,
    ) -> Result<Option<String>, UploadError> {
        let part = multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)?;
        let form = multipart::Form::new()
            .text("year", period.year.to_string())
            .text("month", period.month.to_string())
            .part("file", part);

        let response = self
            .http
            .post(self.url("/upload/payroll"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(UploadError::Auth(error_message(response).await));
        }
        if !status.is_success() {
            return Err(UploadError::Server {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        let text = response.text().await.unwrap_or_default();
        let body: MessageBody = serde_json::from_str(&text).unwrap_or_default();
        Ok(body.message.filter(|m| !m.trim().is_empty()))
    }
}
