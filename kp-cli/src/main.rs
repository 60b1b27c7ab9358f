//! keep-presence CLI - keeps a Slack user's presence active.
//!
//! Runs as a foreground daemon: authenticates with a user token, listens to
//! the real-time event stream and resets presence to active whenever Slack
//! marks the user away without them asking for it.

mod commands;

use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use kp_core::config::AppConfig;
use kp_core::constants;
use kp_core::error::KpResult;
use kp_core::logging;

/// keep-presence - stay active on Slack while the daemon runs.
#[derive(Parser)]
#[command(
    name = "keep-presence",
    version,
    about = "Keep a Slack user's presence active",
    long_about = "Keeps a Slack user's presence active.\n\
                  Reads the user token from SLACK_TOKEN, watches the real-time event stream \
                  and reasserts presence whenever the user is marked away automatically."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Slack user token (overrides the config file).
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for the status command.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep presence active until interrupted (default).
    Run,
    /// Show the user's current presence and exit.
    Status {
        /// Output format (text, json).
        #[arg(short = 'f', long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Build the effective configuration: file, then token, then flags.
fn load_config(cli: &Cli) -> KpResult<AppConfig> {
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from_file(Path::new(path))?,
        None => AppConfig::load_default()?,
    };

    let mut config = config.with_token(cli.token.clone());
    if cli.debug {
        config.logging.level = "debug".into();
    }
    if cli.json {
        config.logging.json_output = true;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", constants::APP_NAME);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logging(&config.logging.level, config.logging.json_output) {
        eprintln!("{}: {e}", constants::APP_NAME);
        return ExitCode::FAILURE;
    }

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(config).await,
        Commands::Status { format } => commands::status::run(config, format).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_shutdown() => ExitCode::from(130),
        Err(e) => {
            error!("exiting: {e}");
            ExitCode::FAILURE
        }
    }
}
