use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use llmboot_core::BootstrapError;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(
    name = "llmboot",
    about = "Bootstrap a local Ollama runtime, model and Python dependencies"
)]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra config file layered over user and project config
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install and start Ollama, pull the model, install dependencies
    Setup(commands::setup::SetupArgs),
    /// Show what is installed and running
    Status(commands::status::StatusArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Setup(args) => commands::setup::run(args, config).await,
        Commands::Status(args) => commands::status::run(args, config).await,
        Commands::Config(args) => commands::config::run(args, config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(message) = error_message(&e) {
                eprintln!("Error: {message}");
            }
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Message for a failed command, `None` when the setup progress output has
/// already reported it.
fn error_message(err: &anyhow::Error) -> Option<String> {
    if err.downcast_ref::<BootstrapError>().is_some() {
        None
    } else {
        Some(format!("{err:#}"))
    }
}

/// Exit status for a failed command: the failing child's exit code when it
/// fits in a process status, otherwise 1.
fn exit_status(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<BootstrapError>()
        .and_then(BootstrapError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .filter(|&code| code != 0)
        .unwrap_or(1)
}
