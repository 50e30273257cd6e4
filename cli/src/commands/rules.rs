// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Automation rule commands

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use dealflow_core::application::builtin_rules::builtin_registry;
use dealflow_core::domain::engine_config::EngineConfigManifest;

#[derive(Subcommand)]
pub enum RulesCommand {
    /// List the built-in rules with their trigger and default state
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: RulesCommand, manifest: &EngineConfigManifest) -> Result<()> {
    match command {
        RulesCommand::List { json } => list(manifest, json),
    }
}

fn list(manifest: &EngineConfigManifest, json: bool) -> Result<()> {
    let automation = &manifest.spec.automation;
    let descriptors = builtin_registry(automation).descriptors();

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    println!("{}", "Automation rules:".bold());
    for rule in &descriptors {
        let state = if rule.enabled { "enabled".green() } else { "disabled".yellow() };
        println!("  {} [{}] on {}", rule.id.bold(), state, rule.trigger);
        println!("    {}", rule.name.dimmed());
    }

    if !automation.stale_lead_orgs.is_empty() {
        println!();
        println!(
            "Stale-lead sweep enabled for {} organization(s)",
            automation.stale_lead_orgs.len()
        );
    }
    Ok(())
}
