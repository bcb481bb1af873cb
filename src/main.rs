//! Gatewire CLI - inspect command JSON and watch a live gateway.
//!
//! This is the main binary entry point. See the `gatewire` library for the
//! core functionality.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gatewire::{commands, Config};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "gatewire")]
#[command(version)]
#[command(about = "Gateway session and application-command tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode, validate and re-encode a command (or array of commands)
    Inspect {
        /// Path to the JSON file
        file: String,
    },
    /// Open a gateway session and log every event until Ctrl-C
    Listen {
        /// Gateway URL, overriding the configured one
        #[arg(long)]
        url: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { file } => {
            commands::inspect::run(&file)?;
        }
        Commands::Listen { url } => {
            let mut config = Config::load()?;
            if let Some(url) = url {
                config.gateway_url = url;
            }
            commands::listen::run(config).await?;
        }
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
