//! Banter CLI - chat with a locally-hosted inference server.

use clap::{Parser, Subcommand};

mod commands;

/// Banter - a chat front end for local AI inference
#[derive(Parser)]
#[command(name = "banter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Host the inference services run on
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port of the discovery service
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List services and endpoints advertised by the server
    Services,

    /// Send one prompt and stream the response
    Ask {
        /// The prompt to send
        prompt: String,
        #[command(flatten)]
        generation: commands::GenerationArgs,
    },

    /// Interactive chat session
    Chat {
        #[command(flatten)]
        generation: commands::GenerationArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let config = commands::client_config(cli.host, cli.port);
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Services => runtime.block_on(commands::services::run(&config)),
        Commands::Ask { prompt, generation } => {
            runtime.block_on(commands::ask::run(&config, &prompt, generation))
        }
        Commands::Chat { generation } => runtime.block_on(commands::chat::run(&config, generation)),
    }
}
