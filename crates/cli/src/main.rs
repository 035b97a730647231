//! toolrelay CLI — the main entry point.
//!
//! Commands:
//! - `init`    — Write a default config
//! - `chat`    — Interactive chat or single-message mode
//! - `tools`   — Search the catalog or call a tool directly
//! - `status`  — Show resolved configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "toolrelay",
    about = "toolrelay — let any LLM call tools from a catalog",
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
    /// Write a default config file
    Init,

    /// Chat with a model that can call catalog tools
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session id (a fresh one by default)
        #[arg(long)]
        session: Option<String>,
    },

    /// Work with the tool catalog directly
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },

    /// Show resolved configuration
    Status,
}

#[derive(Subcommand)]
enum ToolsCommand {
    /// List tools relevant to a query
    Search {
        query: String,

        /// Maximum number of tools to list
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Invoke one tool by its catalog name
    Call {
        name: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
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

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Chat { message, session } => commands::chat::run(message, session).await?,
        Commands::Tools { command } => match command {
            ToolsCommand::Search { query, limit } => commands::tools::search(&query, limit).await?,
            ToolsCommand::Call { name, args } => commands::tools::call(&name, &args).await?,
        },
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
