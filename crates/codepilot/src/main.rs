//! CodePilot - an AI coding assistant confined to a project workspace

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{init_command, models_command, run_command, status_command, RunOptions};

/// CodePilot - AI coding assistant for your terminal
#[derive(Parser)]
#[command(name = "codepilot")]
#[command(about = "An AI coding assistant that works inside one project directory")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,
    /// Ask the agent to do something in the working directory
    Run {
        /// Prompt to send; omit for interactive mode
        prompt: Option<String>,
        /// Log the prompt, function calls and token counts
        #[arg(short, long)]
        verbose: bool,
        /// Working directory the tools are confined to
        #[arg(short, long)]
        workdir: Option<PathBuf>,
        /// Maximum number of model calls per prompt
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Model name, e.g. gemini-2.0-flash-001
        #[arg(short, long)]
        model: Option<String>,
    },
    /// List models available to the configured API key
    Models,
    /// Show configuration status
    Status,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(matches!(cli.command, Commands::Run { verbose: true, .. }));

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Run {
            prompt,
            verbose,
            workdir,
            max_iterations,
            model,
        } => {
            run_command(RunOptions {
                prompt,
                verbose,
                workdir,
                max_iterations,
                model,
            })
            .await
        }
        Commands::Models => models_command().await,
        Commands::Status => status_command().await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
