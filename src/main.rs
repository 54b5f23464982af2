use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use payroll_upload::{
    config::AppConfig,
    models::job::{format_progress, ProcessingStatus},
    models::upload::{PayrollFile, UploadPeriod, UploadRequest},
    services::{
        api::{PayrollApiClient, PayrollBackend},
        clock::{Clock, TokioClock},
        orchestrator::UploadOrchestrator,
        poller::JobStatusPoller,
        validator::FileValidator,
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload payroll batches and follow their processing")]
struct Cli {
    /// Session token issued by the login flow
    #[arg(long, env = "PAYROLL_AUTH_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a payroll PDF for a given month
    Upload {
        file: PathBuf,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
    /// Follow an already launched processing job
    Status { job_id: String },
}

fn print_progress(status: &ProcessingStatus) {
    let percent = status.percent().map(format_progress).unwrap_or_else(|| "-".to_string());
    let step = status
        .current_step
        .as_deref()
        .or(status.message.as_deref())
        .unwrap_or("processing");
    println!("  [{percent}] {step}");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration from environment")?;
    let token = cli
        .token
        .or_else(|| config.auth_token.clone())
        .unwrap_or_default();

    let backend: Arc<dyn PayrollBackend> =
        Arc::new(PayrollApiClient::new(&config.api_url, config.request_timeout())?);
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);

    // Ctrl-C stops any in-flight status loop
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Upload { file, year, month } => {
            // Reject oversized input before buffering it
            let size = tokio::fs::metadata(&file)
                .await
                .with_context(|| format!("Failed to stat {}", file.display()))?
                .len();
            FileValidator::new(config.validation_policy()).check_size(size)?;

            let payroll = PayrollFile::from_path(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            tracing::info!(api_url = %config.api_url, file = %file.display(), "Starting upload");

            let orchestrator = UploadOrchestrator::new(backend, clock, &config);
            let request = UploadRequest {
                period: UploadPeriod { year, month },
                file: payroll,
            };
            let outcome = orchestrator
                .upload(request, &token, print_progress, &cancel)
                .await;

            println!("{}", serde_json::to_string_pretty(&outcome)?);
            ensure!(outcome.success, "{}", outcome.message);
        }
        Command::Status { job_id } => {
            ensure!(
                !token.trim().is_empty(),
                "No session token; log in and set PAYROLL_AUTH_TOKEN"
            );

            let poller = JobStatusPoller::new(backend, clock, config.poll_policy());
            let result = poller.poll(&job_id, &token, print_progress, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
