//! Test fixtures: payroll files and scripted job status snapshots
#![allow(dead_code)]

use payroll_upload::config::PDF_MIME_TYPE;
use payroll_upload::models::job::{ProcessingStatus, Progress, StatusFetch};
use payroll_upload::models::upload::{PayrollFile, PresignedLocation, UploadPeriod, UploadRequest};

pub const MIB: usize = 1024 * 1024;

/// A PDF-typed payload of the given size.
pub fn pdf_file(name: &str, size: usize) -> PayrollFile {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(size.max(bytes.len()), b' ');
    bytes.truncate(size);
    PayrollFile::new(name, PDF_MIME_TYPE, bytes)
}

pub fn march_2024(file: PayrollFile) -> UploadRequest {
    UploadRequest {
        period: UploadPeriod {
            year: 2024,
            month: 3,
        },
        file,
    }
}

pub fn location(upload_url: &str) -> PresignedLocation {
    PresignedLocation {
        upload_url: upload_url.to_string(),
        file_key: "payroll/2024/03/folha.pdf".to_string(),
        expires_in: 3600,
        issued_at: None,
    }
}

pub fn processing(percent: f64) -> StatusFetch {
    snapshot(ProcessingStatus {
        status: "processing".into(),
        progress: Some(Progress::Percent(percent)),
        ..Default::default()
    })
}

pub fn completed(result: serde_json::Value) -> StatusFetch {
    snapshot(ProcessingStatus {
        status: "completed".into(),
        progress: Some(Progress::Percent(100.0)),
        result: Some(result),
        ..Default::default()
    })
}

pub fn completed_without_result() -> StatusFetch {
    snapshot(ProcessingStatus {
        status: "completed".into(),
        ..Default::default()
    })
}

pub fn failed(error: Option<&str>) -> StatusFetch {
    snapshot(ProcessingStatus {
        status: "error".into(),
        error: error.map(str::to_string),
        ..Default::default()
    })
}

pub fn with_status(status: &str) -> StatusFetch {
    snapshot(ProcessingStatus {
        status: status.into(),
        ..Default::default()
    })
}

pub fn snapshot(status: ProcessingStatus) -> StatusFetch {
    StatusFetch::Snapshot { status, etag: None }
}

pub fn payslip_result() -> serde_json::Value {
    serde_json::json!({
        "processedPayslips": 212,
        "skippedPages": 0,
    })
}
