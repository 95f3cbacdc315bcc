//! SchoolPilot CLI entry point.
//!
//! Commands:
//! - `serve`   Start the HTTP gateway
//! - `chat`    Interactive chat or single-message mode
//! - `corpus`  Print the rendered school corpus

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "schoolpilot",
    about = "SchoolPilot: school and career advisor",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.schoolpilot/config.toml)
    #[arg(short, long, global = true, env = "SCHOOLPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the advisor
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session id to use (a fresh one is minted otherwise)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Print the rendered knowledge corpus
    Corpus {
        /// Corpus file to render instead of the configured one
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Chat { message, session } => {
            commands::chat::run(config, message, session).await?
        }
        Commands::Corpus { path } => commands::corpus::run(config, path)?,
    }

    Ok(())
}
