use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, ActionOutcome, ClientSettings, HttpVehicleService, ResultPanel, SelectedFile,
    SessionEvent, SessionView, VehicleService, WorkflowOrchestrator,
};
use shared::{domain::RecordId, protocol::StatisticRecord};
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "vehicle-stats",
    about = "Count motorbikes, cars and trucks in an image or video"
)]
struct Cli {
    /// Base URL of the vehicle detection service.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Config file; defaults to ./vehicle_stats.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Where downloaded outputs are written.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file and run vehicle detection on it.
    Detect {
        file: PathBuf,
        /// Persist the counts once detection succeeds.
        #[arg(long)]
        save: bool,
        /// Download the annotated output into the output directory.
        #[arg(long)]
        download: bool,
    },
    /// List recently saved results, or show one by id.
    Stats {
        #[arg(long)]
        id: Option<String>,
    },
    Health,
    /// Remove temporary uploads and outputs on the service.
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = resolve_settings(&cli)?;
    let service = Arc::new(HttpVehicleService::from_settings(&settings)?);
    info!(api_base_url = %service.base_url(), "using vehicle service");

    match cli.command {
        Command::Detect {
            file,
            save,
            download,
        } => Ok(run_detect(service, &settings, &file, save, download)
            .await?
            .exit_code()),
        Command::Stats { id } => {
            match id {
                Some(id) => {
                    let record = service
                        .get_statistic(&RecordId::new(id))
                        .await
                        .map_err(|err| anyhow!(err.user_message()))?;
                    print_record(&record);
                }
                None => {
                    let records = service
                        .list_statistics()
                        .await
                        .map_err(|err| anyhow!(err.user_message()))?;
                    if records.is_empty() {
                        println!("No saved results.");
                    }
                    for record in &records {
                        print_record(record);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let health = service
                .health()
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            println!("service status: {}", health.status);
            Ok(if health.is_healthy() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Cleanup => {
            let message = service
                .cleanup()
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            println!(
                "{}",
                message.unwrap_or_else(|| "Temporary files removed".to_string())
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn resolve_settings(cli: &Cli) -> Result<ClientSettings> {
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(v) = &cli.api_url {
        settings.api_base_url = v.clone();
    }
    if let Some(v) = cli.timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = &cli.output_dir {
        settings.output_dir = v.clone();
    }
    Ok(settings)
}

/// What one `detect` invocation achieved. Save and download are judged separately.
#[derive(Debug)]
struct DetectReport {
    detection: ActionOutcome,
    save: Option<ActionOutcome>,
    downloaded: Option<PathBuf>,
    download_error: Option<String>,
}

impl DetectReport {
    fn succeeded(&self) -> bool {
        self.detection.is_completed()
            && self.save.as_ref().map_or(true, ActionOutcome::is_completed)
            && self.download_error.is_none()
    }

    fn exit_code(&self) -> ExitCode {
        if self.succeeded() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

async fn run_detect(
    service: Arc<HttpVehicleService>,
    settings: &ClientSettings,
    path: &Path,
    save: bool,
    download: bool,
) -> Result<DetectReport> {
    let file = SelectedFile::from_path(path).await?;
    let orchestrator = WorkflowOrchestrator::new(service.clone());
    let progress = spawn_progress_printer(&orchestrator);

    orchestrator.select_file(file).await;
    let detection = orchestrator.run_detection().await;
    if detection.is_completed() {
        print_results(&orchestrator.view().await);
        if let Some(artifact) = orchestrator.download_result().await {
            println!("Annotated output: {}", artifact.inline_url);
            println!("Download link:    {}", artifact.download_url);
        }
    }

    let save_outcome = if save && detection.is_completed() {
        let outcome = orchestrator.save_result().await;
        if let Some(id) = orchestrator.view().await.saved_id {
            println!("Saved as record {id}");
        }
        Some(outcome)
    } else {
        None
    };

    // Download only needs an output artifact; a failed save does not block it.
    let artifact = if download {
        orchestrator.download_result().await
    } else {
        None
    };

    let view = orchestrator.view().await;
    drop(orchestrator);
    if let Err(err) = progress.await {
        warn!(error = %err, "progress printer stopped unexpectedly");
    }

    let mut report = DetectReport {
        detection,
        save: save_outcome,
        downloaded: None,
        download_error: None,
    };

    if let Some(artifact) = artifact {
        match service.retrieve(&artifact.output_name).await {
            Ok(bytes) => {
                let target =
                    write_output(&settings.output_dir, artifact.output_name.as_str(), &bytes)
                        .await?;
                println!("Downloaded {} bytes to {}", bytes.len(), target.display());
                report.downloaded = Some(target);
            }
            Err(err) => {
                warn!(url = %artifact.download_url, error = %err, "download failed");
                report.download_error = Some(format!("Download failed: {}", err.user_message()));
            }
        }
    }

    if !report.succeeded() {
        let failed_stage = !report.detection.is_completed()
            || report.save.as_ref().is_some_and(|outcome| !outcome.is_completed());
        if failed_stage {
            eprintln!("{}", view.status_message);
        }
        if let Some(message) = &report.download_error {
            eprintln!("{message}");
        }
    }
    Ok(report)
}

fn spawn_progress_printer(orchestrator: &WorkflowOrchestrator) -> JoinHandle<()> {
    let mut events = orchestrator.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::PhaseChanged { phase, message }) => {
                    eprintln!("[{phase}] {message}");
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn print_results(view: &SessionView) {
    let (ResultPanel::Image { counts, .. } | ResultPanel::Video { counts, .. }) = &view.panel
    else {
        return;
    };
    let media = view
        .panel
        .media_kind()
        .map(|kind| kind.to_string())
        .unwrap_or_default();
    println!(
        "Detection results for {} ({media}):",
        view.selected_file_name.as_deref().unwrap_or("file")
    );
    println!("  motorbikes  {:>6}", counts.motorbikes);
    println!("  cars        {:>6}", counts.cars);
    println!("  trucks      {:>6}", counts.trucks);
    println!("  total       {:>6}", counts.total());
}

fn print_record(record: &StatisticRecord) {
    let processed_at = record
        .processed_at
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let counts = record.vehicle_counts;
    println!(
        "{}  {processed_at}  {}  motorbikes={} cars={} trucks={}",
        record.id,
        record.filename.as_deref().unwrap_or("-"),
        counts.motorbikes,
        counts.cars,
        counts.trucks
    );
}

async fn write_output(output_dir: &Path, output_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let file_name = Path::new(output_name)
        .file_name()
        .ok_or_else(|| anyhow!("service returned an unusable output name '{output_name}'"))?;
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("failed to create '{}'", output_dir.display()))?;
    let target = output_dir.join(file_name);
    tokio::fs::write(&target, bytes)
        .await
        .with_context(|| format!("failed to write '{}'", target.display()))?;
    Ok(target)
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
