//! Lectern CLI, the main entry point.
//!
//! Commands:
//! - `onboard` : Write the default config
//! - `agent`   : Interactive tutoring chat or single-message mode
//! - `gateway` : Start the HTTP API server
//! - `status`  : Show configuration status

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "lectern",
    about = "Lectern, a streaming, tool-using tutoring agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Onboard,

    /// Chat with the tutor
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Agent { message, session } => commands::agent::run(message, session).await?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
