//! CodePilot command implementations

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{debug, info};

use codepilot_agent::tools::{default_tools, ToolSettings};
use codepilot_agent::{prepare_workspace, AgentLoop, LoopOutcome, LoopSettings, LoopStatus};
use codepilot_config::{self, Config, API_KEY_ENV};
use codepilot_provider::GeminiProvider;

/// Options for `codepilot run`
pub struct RunOptions {
    pub prompt: Option<String>,
    pub verbose: bool,
    pub workdir: Option<PathBuf>,
    pub max_iterations: Option<u32>,
    pub model: Option<String>,
}

fn provider_from(config: &Config) -> Result<GeminiProvider> {
    let api_key = config.api_key().with_context(|| {
        format!(
            "No API key configured. Set {} or add one to {}",
            API_KEY_ENV,
            codepilot_config::config_path().display()
        )
    })?;
    Ok(GeminiProvider::new(
        api_key,
        config.api_base(),
        Some(config.default_model()),
    ))
}

/// Write a default config file
pub async fn init_command() -> Result<()> {
    println!("Initializing CodePilot...");

    codepilot_config::init()
        .await
        .context("Failed to write config")?;

    println!("Config: {}", codepilot_config::config_path().display());
    println!("\nNext steps:");
    println!("  1. Export {} or add provider.api_key to the config", API_KEY_ENV);
    println!("  2. Run: codepilot run \"What files are in the root?\"");

    Ok(())
}

/// Run one prompt, or read prompts line by line when none is given
pub async fn run_command(options: RunOptions) -> Result<()> {
    let config = Config::load().await.context("Failed to load config")?;
    let provider = provider_from(&config)?;

    let requested = options.workdir.unwrap_or_else(|| config.working_dir());
    let workspace = prepare_workspace(&requested)
        .await
        .with_context(|| format!("Cannot use {} as working directory", requested.display()))?;
    info!("Working directory: {}", workspace.display());

    let mut settings = LoopSettings::from_config(&config);
    settings.verbose = options.verbose;
    if let Some(max) = options.max_iterations {
        settings.max_iterations = max;
    }
    if let Some(model) = options.model {
        settings.model = model;
    }
    debug!("Loop settings: {:?}", settings);

    let tools = default_tools(&workspace, &ToolSettings::from_config(&config));
    let agent = AgentLoop::new(provider, tools, settings);

    match options.prompt {
        Some(prompt) => {
            let outcome = agent.run(&prompt).await.context("Agent run failed")?;
            print_outcome(&outcome);
        }
        None => interactive(&agent).await?,
    }

    Ok(())
}

async fn interactive(agent: &AgentLoop<GeminiProvider>) -> Result<()> {
    println!("Interactive mode (type 'exit' to quit)");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        let outcome = agent.run(input).await.context("Agent run failed")?;
        print_outcome(&outcome);
        println!();
    }

    Ok(())
}

fn print_outcome(outcome: &LoopOutcome) {
    if !outcome.text.is_empty() {
        println!("{}", outcome.text);
    }
    if outcome.status == LoopStatus::IterationLimit {
        println!("(stopped after {} model calls)", outcome.iterations);
    }
}

/// Print the models the configured key can use
pub async fn models_command() -> Result<()> {
    let config = Config::load().await.context("Failed to load config")?;
    let provider = provider_from(&config)?;

    let models = provider
        .list_models()
        .await
        .context("Failed to list models")?;
    for model in models {
        println!("{}", model);
    }

    Ok(())
}

/// Show configuration status
pub async fn status_command() -> Result<()> {
    let config_path = codepilot_config::config_path();
    let config = Config::load().await.context("Failed to load config")?;
    let workspace = config.working_dir();

    println!("CodePilot Status");
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );
    println!(
        "Workdir:   {} {}",
        workspace.display(),
        if workspace.is_dir() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );
    println!("Model:     {}", config.default_model());
    println!(
        "API Key:   {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("Max calls: {}", config.agent.max_iterations);
    println!(
        "Executor:  {} (*.{}, {}s timeout)",
        config.tools.interpreter, config.tools.script_extension, config.tools.exec_timeout_secs
    );

    Ok(())
}
