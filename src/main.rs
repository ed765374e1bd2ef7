//! `ytdl-jobs` -- run a single background download and watch it.
//!
//! Engine output is printed to stdout line by line, the spinner and the
//! runner's own logs go to stderr. Ctrl-C cancels the running job.
//!
//! # Environment variables
//!
//! See [`ytdl_jobs::JobsConfig::from_env`]. A `.env` file is honoured.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytdl_jobs::downloader::diagnostics::diagnose_error;
use ytdl_jobs::downloader::effective_options;
use ytdl_jobs::downloader::spinner::IDLE_TEXT;
use ytdl_jobs::{
    DownloadError, JobOutcome, JobRequest, JobSupervisor, JobUpdate, JobsConfig, ProfileRegistry, YtDlpEngine,
};

#[derive(Parser)]
#[command(name = "ytdl-jobs", version, about = "Background download jobs with streamed log events")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the registered download profiles
    Profiles,
    /// Print the engine options a profile resolves to
    Show {
        profile: String,
        #[arg(long)]
        subs: bool,
    },
    /// Download a target and stream the engine log
    Run {
        target: String,
        #[arg(short, long, default_value = ytdl_jobs::downloader::DEFAULT_PROFILE)]
        profile: String,
        #[arg(long)]
        subs: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "ytdl_jobs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Profiles => {
            let default = &ProfileRegistry::default_profile().name;
            for name in ProfileRegistry::enumerate_names() {
                if name == default {
                    println!("{} (default)", name);
                } else {
                    println!("{}", name);
                }
            }
            ExitCode::SUCCESS
        }
        Command::Show { profile, subs } => {
            let request = JobRequest::new("", profile).with_subtitles(subs);
            let options = effective_options(&request, ProfileRegistry::resolve(&request.profile_name));
            match serde_json::to_string_pretty(&options) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!("failed to render options: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Run {
            target,
            profile,
            subs,
            output,
        } => {
            let request = JobRequest::new(target, profile).with_subtitles(subs);
            match run(request, output).await {
                Ok(JobOutcome::Completed) => ExitCode::SUCCESS,
                Ok(JobOutcome::Cancelled) => ExitCode::from(130),
                Ok(JobOutcome::Failed(message)) => {
                    if diagnose_error(&message).is_some_and(|reason| reason.is_retryable()) {
                        eprintln!("This failure is often temporary; retrying later or through a proxy may help.");
                    }
                    ExitCode::FAILURE
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn run(request: JobRequest, output: Option<PathBuf>) -> Result<JobOutcome, DownloadError> {
    let mut config = JobsConfig::from_env();
    if let Some(output) = output {
        config.output_dir = output;
    }
    tracing::debug!(?config, "effective runner configuration");

    let engine = YtDlpEngine::locate(config.ytdlp_path.as_deref(), config.output_dir.clone())?
        .with_proxy(config.proxy.clone());
    let supervisor = Arc::new(JobSupervisor::new(Arc::new(engine)));
    let mut events = supervisor.start(request)?;

    let watcher = supervisor.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && watcher.cancel() {
            tracing::warn!("interrupted, cancelling job");
        }
    });

    let outcome = supervisor
        .poll_until_complete(&mut events, config.timing(), |update| match update {
            JobUpdate::Log(event) => {
                eprint!("\r\x1b[2K");
                println!("{}", event);
            }
            JobUpdate::Spinner(frame) => {
                eprint!("\r{}", frame);
                let _ = std::io::stderr().flush();
            }
            JobUpdate::Finished(outcome) => {
                eprintln!("\r\x1b[2K{}", IDLE_TEXT);
                tracing::info!(?outcome, "download finished");
            }
        })
        .await;
    interrupt.abort();

    outcome.ok_or_else(|| DownloadError::ExecutionError("job vanished before completion".to_string()))
}
