// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use dealflow_core::domain::engine_config::EngineConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./dealflow-config.yaml)
        #[arg(short, long, default_value = "./dealflow-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = EngineConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        for (index, path) in EngineConfigManifest::candidate_paths().iter().enumerate() {
            let marker = if path.exists() { "found".green() } else { "missing".dimmed() };
            println!("  {}. {} ({})", index + 2, path.display(), marker);
        }
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Underwriting:".bold());
    println!("  Investor multiplier: {}", spec.underwriting.default_investor_multiplier);
    println!("  Desired fee: {}", spec.underwriting.default_desired_fee);
    println!();

    println!("{}", "Needs attention:".bold());
    println!("  No activity: {} days", spec.attention.no_activity_days);
    println!("  Stage unchanged: {} days", spec.attention.stage_unchanged_days);
    println!("  Old issues: {} days", spec.attention.old_issue_days);
    println!("  Close date warning: {} days", spec.attention.close_date_warning_days);
    println!();

    println!("{}", "Automation:".bold());
    println!("  High-value ARV threshold: {}", spec.automation.high_value_arv_threshold);
    println!("  Stale lead after: {} days", spec.automation.stale_lead_days);
    if spec.automation.stale_lead_orgs.is_empty() {
        println!("  Stale lead sweep: {}", "(no organizations opted in)".dimmed());
    } else {
        println!("  Stale lead sweep:");
        for org_id in &spec.automation.stale_lead_orgs {
            println!("    - {}", org_id);
        }
    }
    println!();

    println!("{}", "Side effects:".bold());
    println!("  Realtime capacity: {}", spec.side_effects.realtime_capacity);
    println!("  Notification capacity: {}", spec.side_effects.notification_capacity);
    println!("  Event queue capacity: {}", spec.side_effects.event_queue_capacity);
    println!("  Event flush batch: {}", spec.side_effects.event_flush_batch_size);
    println!();

    println!("{}", "Jurisdictions:".bold());
    match &spec.jurisdictions {
        Some(files) => println!("  Profiles: {}", files.profiles_path.display()),
        None => println!("  Profiles: {}", "(none, every location is unconfigured)".dimmed()),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = EngineConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_templates_are_valid_manifests() {
        for template in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let manifest = dealflow_core::domain::engine_config::EngineConfigManifest::from_yaml_str(template).unwrap();
            manifest.validate().unwrap();
        }
    }
}
