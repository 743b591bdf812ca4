//! Secretary CLI — the main entry point.
//!
//! Commands:
//! - `serve`  — Run the orchestrator over JSON lines on stdin/stdout
//! - `chat`   — Send a single message as a user and print the reply
//! - `config` — Show the loaded or default configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "secretary",
    about = "Secretary — personal assistant orchestrator",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (default: ~/.secretary/config.toml)
    #[arg(short, long, global = true, env = "SECRETARY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read inbound events as JSON lines from stdin and write replies to stdout
    Serve {
        /// Also deliver replies through the notification service
        #[arg(long)]
        deliver: bool,
    },

    /// Send one message as a user and print the reply
    Chat {
        /// Chat platform user id
        #[arg(short, long)]
        user: String,

        /// The message text
        message: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Print a default config file
    Default,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout carries replies.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { deliver } => commands::serve::run(config_path, deliver).await?,
        Commands::Chat { user, message } => commands::chat::run(config_path, &user, &message).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Default => commands::config_cmd::default(),
            ConfigAction::Path => commands::config_cmd::path(config_path),
        },
    }

    Ok(())
}
