//! Taskship CLI - Entry Point

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use taskship::app::options::{AppOptions, DeployArgs};
use taskship::app::run::run;
use taskship::logs::{init_logging, LogLevel, LogOptions};
use taskship::storage::layout::StorageLayout;
use taskship::storage::profiles::DEFAULT_PROFILE;
use taskship::utils::version_info;

#[derive(Debug, Parser)]
#[command(name = "taskship", version, about = "Deploy background tasks to Taskship")]
struct Cli {
    /// The log level to use (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TASKSHIP_LOG_LEVEL", default_value = "warn")]
    log_level: LogLevel,

    /// Write diagnostic logs to stderr as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Override the API URL of the login profile
    #[arg(long, global = true, env = "TASKSHIP_API_URL")]
    api_url: Option<String>,

    /// The login profile to use
    #[arg(long, global = true, default_value = DEFAULT_PROFILE)]
    profile: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Deploy your tasks to an environment
    Deploy(DeployArgs),
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let layout = StorageLayout::default();

    let _guard = init_logging(LogOptions {
        log_level: cli.log_level.clone(),
        json_format: cli.log_json,
        log_dir: Some(layout.logs_dir().path().to_path_buf()),
    })
    .context("failed to initialize logging")?;

    let version = version_info();
    debug!(version = %version.version, git_hash = %version.git_hash, "taskship CLI");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let options = AppOptions {
        api_url: cli.api_url,
        profile: cli.profile,
        layout,
    };

    let code = match cli.command {
        Commands::Deploy(args) => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            runtime.block_on(run(options, args.into_request(&cwd)))
        }
    };

    Ok(ExitCode::from(code.clamp(0, 255) as u8))
}
