// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Dealflow CLI
//!
//! The `dealflow` binary exposes the lifecycle engine's offline tooling.
//!
//! ## Commands
//!
//! - `dealflow config show|validate|generate` - Configuration management
//! - `dealflow rules list` - Built-in automation rules
//! - `dealflow attention --snapshot FILE` - Needs-attention scan over a snapshot
//! - `dealflow stage check --snapshot FILE --deal ID --to STAGE` - Stage transition preview

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use dealflow_cli::commands::{self, AttentionArgs, ConfigCommand, RulesCommand, StageCommand};
use dealflow_core::domain::engine_config::EngineConfigManifest;

/// Dealflow - lead, deal and closing lifecycle engine
#[derive(Parser)]
#[command(name = "dealflow")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "DEALFLOW_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config file, then warn
    #[arg(long, global = true, env = "DEALFLOW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (text, json); defaults to the config file, then text
    #[arg(long, global = true, env = "DEALFLOW_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Automation rules
    #[command(name = "rules")]
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// Scan a snapshot for deals that need attention
    #[command(name = "attention")]
    Attention(AttentionArgs),

    /// Legal stage tools
    #[command(name = "stage")]
    Stage {
        #[command(subcommand)]
        command: StageCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine
    let dotenv = dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Loaded before logging so the file's logging section can apply
    let loaded = EngineConfigManifest::load_or_default(cli.config.clone());
    let configured = loaded.as_ref().ok();
    let level = cli
        .log_level
        .as_deref()
        .or_else(|| configured.and_then(|m| m.log_level()))
        .unwrap_or("warn");
    let format = cli
        .log_format
        .as_deref()
        .or_else(|| configured.and_then(|m| m.log_format()))
        .unwrap_or("text");

    // Initialize logging
    init_logging(level, format)?;
    if let Some(path) = dotenv {
        debug!("Loaded environment from {:?}", path);
    }

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Rules { command }) => {
            let manifest = validated(loaded)?;
            commands::rules::handle_command(command, &manifest).await
        }
        Some(Commands::Attention(args)) => {
            let manifest = validated(loaded)?;
            commands::attention::execute(args, &manifest).await
        }
        Some(Commands::Stage { command }) => {
            let manifest = validated(loaded)?;
            commands::stage::handle_command(command, &manifest).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

fn validated(loaded: Result<EngineConfigManifest>) -> Result<EngineConfigManifest> {
    let manifest = loaded.context("Failed to load configuration")?;
    manifest.validate().context("Configuration validation failed")?;
    Ok(manifest)
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        "text" => builder.compact().init(),
        other => anyhow::bail!("Invalid log format: '{}'. Must be 'text' or 'json'", other),
    }

    Ok(())
}
