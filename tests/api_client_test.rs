//! HTTP status mapping and transfer retries against a local mock server.

mod fixtures;
mod helpers;

use fixtures::*;
use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;

use payroll_upload::config::{TransferPolicy, PDF_MIME_TYPE};
use payroll_upload::error::UploadError;
use payroll_upload::models::job::StatusFetch;
use payroll_upload::models::upload::{UploadPeriod, ValidFile};
use payroll_upload::services::api::{PayrollApiClient, PayrollBackend};
use payroll_upload::services::clock::TokioClock;
use payroll_upload::services::presigned::PresignedUploadClient;

const PERIOD: UploadPeriod = UploadPeriod {
    year: 2024,
    month: 3,
};

fn client(server: &mockito::Server) -> PayrollApiClient {
    PayrollApiClient::new(&server.url(), Duration::from_secs(5)).expect("client")
}

fn valid_pdf() -> ValidFile {
    ValidFile {
        name: "folha.pdf".into(),
        mime_type: PDF_MIME_TYPE.into(),
        bytes: b"%PDF-1.7 test".to_vec().into(),
    }
}

fn uploader(api: PayrollApiClient) -> PresignedUploadClient {
    PresignedUploadClient::new(
        Arc::new(api),
        Arc::new(TokioClock),
        TransferPolicy {
            max_attempts: 3,
            retry_delay: Duration::ZERO,
        },
    )
}

#[tokio::test]
async fn test_request_location_parses_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/presigned-url")
        .match_header("authorization", "Bearer token-1")
        .match_body(Matcher::Json(serde_json::json!({
            "year": 2024,
            "month": 3,
            "contentType": "application/pdf"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"uploadUrl":"https://bucket/key","fileKey":"payroll/key.pdf","expiresIn":300,"year":2024,"month":3}"#)
        .create_async()
        .await;

    let location = client(&server)
        .request_location(PERIOD, PDF_MIME_TYPE, "token-1")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(location.upload_url, "https://bucket/key");
    assert_eq!(location.file_key, "payroll/key.pdf");
    assert_eq!(location.expires_in, 300);
}

#[tokio::test]
async fn test_request_location_unauthorized() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/presigned-url")
        .with_status(401)
        .with_body(r#"{"message":"Token expired"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = client(&server)
        .request_location(PERIOD, PDF_MIME_TYPE, "stale")
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, UploadError::Auth(ref m) if m == "Token expired"));
}

#[tokio::test]
async fn test_transfer_retries_server_errors_then_gives_up() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/bucket/folha.pdf")
        .match_header("content-type", PDF_MIME_TYPE)
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let target = location(&format!("{}/bucket/folha.pdf", server.url()));
    let err = uploader(client(&server))
        .transfer(&target, &valid_pdf())
        .await
        .unwrap_err();

    mock.assert_async().await;
    match err {
        UploadError::UploadExhausted {
            attempts,
            last_status,
            ..
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_status, Some(500));
        }
        other => panic!("expected UploadExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transfer_retries_connection_failures() {
    // Bind then release a port so nothing is listening on it
    let closed = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = closed.local_addr().expect("addr");
    drop(closed);

    let api = PayrollApiClient::new(&format!("http://{addr}"), Duration::from_secs(5)).expect("client");
    let clock = Arc::new(helpers::ManualClock::new());
    let uploader = PresignedUploadClient::new(
        Arc::new(api),
        clock.clone(),
        TransferPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        },
    );

    let target = location(&format!("http://{addr}/bucket/folha.pdf"));
    let err = uploader.transfer(&target, &valid_pdf()).await.unwrap_err();

    match err {
        UploadError::UploadExhausted {
            attempts,
            last_status,
            ref message,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_status, None);
            assert!(message.starts_with("Network error"), "{message}");
        }
        other => panic!("expected UploadExhausted, got {other:?}"),
    }
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 2]);
}

#[tokio::test]
async fn test_transfer_forbidden_is_permanent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/bucket/folha.pdf")
        .with_status(403)
        .with_body("<Error><Code>SignatureDoesNotMatch</Code></Error>")
        .expect(1)
        .create_async()
        .await;

    let target = location(&format!("{}/bucket/folha.pdf", server.url()));
    let err = uploader(client(&server))
        .transfer(&target, &valid_pdf())
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, UploadError::Permission(ref m) if m.contains("SignatureDoesNotMatch")));
}

#[tokio::test]
async fn test_transfer_other_client_errors_are_permanent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/bucket/folha.pdf")
        .with_status(400)
        .expect(1)
        .create_async()
        .await;

    let target = location(&format!("{}/bucket/folha.pdf", server.url()));
    let err = uploader(client(&server))
        .transfer(&target, &valid_pdf())
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(err, UploadError::Server { status: 400, .. }));
}

#[tokio::test]
async fn test_launch_requires_accepted_status() {
    let mut server = mockito::Server::new_async().await;
    let accepted = server
        .mock("POST", "/process-s3-upload")
        .match_body(Matcher::PartialJson(serde_json::json!({"fileKey": "k1"})))
        .with_status(202)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"queued","jobId":"process:abc","status":"processing"}"#)
        .create_async()
        .await;
    let ok_but_wrong = server
        .mock("POST", "/process-s3-upload")
        .match_body(Matcher::PartialJson(serde_json::json!({"fileKey": "k2"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"jobId":"abc"}"#)
        .create_async()
        .await;

    let api = client(&server);
    let launched = api.launch_processing("k1", PERIOD, "token").await.unwrap();
    assert_eq!(launched.job_id.as_deref(), Some("process:abc"));

    let err = api.launch_processing("k2", PERIOD, "token").await.unwrap_err();
    assert!(matches!(err, UploadError::ServerContract(_)));

    accepted.assert_async().await;
    ok_but_wrong.assert_async().await;
}

#[tokio::test]
async fn test_launch_error_statuses() {
    let cases = [
        (404, "not_found"),
        (401, "auth"),
        (500, "launch"),
    ];

    for (status, kind) in cases {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/process-s3-upload")
            .with_status(status)
            .with_body(r#"{"message":"boom"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .launch_processing("k", PERIOD, "token")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "status {status}");
    }
}

#[tokio::test]
async fn test_status_returns_snapshot_with_etag() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/process-s3-upload/status/abc")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("etag", "\"v7\"")
        .with_body(r#"{"status":"processing","progress":35,"currentStep":"extracting pages"}"#)
        .create_async()
        .await;

    let fetched = client(&server)
        .fetch_status("abc", "token", None)
        .await
        .unwrap();

    match fetched {
        StatusFetch::Snapshot { status, etag } => {
            assert_eq!(status.percent(), Some(35.0));
            assert_eq!(status.current_step.as_deref(), Some("extracting pages"));
            assert_eq!(etag.as_deref(), Some("\"v7\""));
        }
        StatusFetch::NotModified => panic!("expected a snapshot"),
    }
}

#[tokio::test]
async fn test_status_not_modified_with_conditional_header() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/process-s3-upload/status/abc")
        .match_header("if-none-match", "\"v7\"")
        .with_status(304)
        .create_async()
        .await;

    let fetched = client(&server)
        .fetch_status("abc", "token", Some("\"v7\""))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(matches!(fetched, StatusFetch::NotModified));
}

#[tokio::test]
async fn test_status_unknown_job() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/process-s3-upload/status/missing")
        .with_status(404)
        .create_async()
        .await;

    let err = client(&server)
        .fetch_status("missing", "token", None)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::NotFound(_)));
}

#[tokio::test]
async fn test_direct_upload_sends_multipart_form() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/upload/payroll")
        .match_header("authorization", "Bearer token")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data".to_string()),
        )
        .match_body(Matcher::Regex(r#"name="month"\r\n\r\n3"#.to_string()))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Arquivo enviado com sucesso!"}"#)
        .create_async()
        .await;

    let message = client(&server)
        .upload_direct(PERIOD, &valid_pdf(), "token")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(message.as_deref(), Some("Arquivo enviado com sucesso!"));
}

#[tokio::test]
async fn test_direct_upload_error_message_from_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/upload/payroll")
        .with_status(422)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Payroll for 03/2024 already exists"}"#)
        .create_async()
        .await;

    let err = client(&server)
        .upload_direct(PERIOD, &valid_pdf(), "token")
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Server error 422: Payroll for 03/2024 already exists"
    );
}
