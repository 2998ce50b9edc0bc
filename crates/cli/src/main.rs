//! rolerag CLI: the main entry point.
//!
//! Commands:
//! - `serve`     Start the HTTP gateway
//! - `ask`       Run one chat request through the pipeline
//! - `sections`  Print the section hierarchy for a set of roles
//! - `reembed`   Re-embed a snapshot file with the configured model
//! - `doctor`    Check config, provider and snapshot
//! - `config`    Show, locate or initialize the config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "rolerag",
    about = "rolerag: a role-aware HR assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.rolerag/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask one question and print the answer
    Ask {
        /// The question
        #[arg(short, long)]
        message: String,

        /// Comma-separated role ids (defaults to roles.default_roles)
        #[arg(short, long)]
        roles: Option<String>,

        /// Base URL for related-section links
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Print the section hierarchy visible to a set of roles
    Sections {
        /// Comma-separated role ids (defaults to roles.default_roles)
        #[arg(short, long)]
        roles: Option<String>,
    },

    /// Embed the text field of every record in a snapshot file
    Reembed {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Name of the text field to embed
        #[arg(short, long, default_value = "text")]
        field: String,
    },

    /// Diagnose configuration, provider and snapshot
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
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
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask {
            message,
            roles,
            base_url,
        } => commands::ask::run(config_path, message, roles, base_url).await?,
        Commands::Sections { roles } => commands::sections::run(config_path, roles).await?,
        Commands::Reembed {
            input,
            output,
            field,
        } => commands::reembed::run(config_path, &input, &output, &field).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path),
            ConfigAction::Init { force } => commands::config_cmd::init(config_path, force)?,
        },
    }

    Ok(())
}
