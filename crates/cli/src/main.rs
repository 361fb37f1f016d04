//! Taskloom CLI, the main entry point.
//!
//! Commands:
//! - `run`     Run a task in a mode (standard, chat, coder, flow)
//! - `config`  Save, load, list, delete and show configurations
//! - `modes`   List the available modes and their defaults

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "taskloom",
    about = "Taskloom: autonomous agents and multi-agent flows",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task
    Run(commands::run::RunArgs),

    /// Manage saved configurations
    Config {
        #[command(subcommand)]
        command: commands::config_cmd::ConfigCommand,
    },

    /// List the available modes
    Modes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await?,
        Commands::Config { command } => commands::config_cmd::run(command)?,
        Commands::Modes => commands::modes::run(),
    }

    Ok(())
}
