//! # Main Entry Point
//!
//! Loads configuration, installs logging, builds the agent and hands off to
//! the requested command handler.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use deckhand::application::logging::init_logging;
use deckhand::interface::cli::{Cli, Command};
use deckhand::interface::commands::{action, status};
use deckhand::{AgentConfig, ChildAgent};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Load Configuration
    let config_path = cli.config_path();
    let config = AgentConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // 2. Logging Setup
    let _guard = init_logging(&config.logging).context("Failed to initialize logging")?;
    tracing::info!("Starting deckhand (config: {})", config_path.display());

    // 3. Agent
    let mut agent = ChildAgent::new(config);
    agent.initialize().await?;

    let mut stdout = std::io::stdout().lock();
    let ok = match cli.command {
        Command::Capabilities => {
            action::handle_capabilities(&agent, &mut stdout)?;
            true
        }
        Command::Exec {
            action_type,
            params,
            priority,
        } => action::handle_exec(&mut agent, &action_type, &params, priority, &mut stdout).await?,
        Command::Run { file } => action::handle_run(&mut agent, &file, &mut stdout).await? == 0,
        Command::Status => {
            status::handle_status(&mut agent, &mut stdout).await?;
            true
        }
    };

    agent.shutdown().await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
