// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Legal stage commands
//!
//! Commands: check

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use dealflow_core::application::{LegalStageService, LifecycleEngine};
use dealflow_core::domain::deal::DealId;
use dealflow_core::domain::engine_config::EngineConfigManifest;
use dealflow_core::domain::jurisdiction::StageValidation;
use dealflow_core::domain::legal_stage::LegalStage;
use dealflow_core::infrastructure::YamlJurisdictionProvider;

use crate::snapshot::Snapshot;

#[derive(Subcommand)]
pub enum StageCommand {
    /// Preview a stage transition without applying it
    Check {
        /// JSON snapshot containing the deal
        #[arg(long, value_name = "FILE")]
        snapshot: PathBuf,

        /// Deal to check
        #[arg(long, value_name = "DEAL_ID")]
        deal: String,

        /// Target stage (e.g. ASSIGNED, title-clearing)
        #[arg(long, value_name = "STAGE")]
        to: String,

        /// Jurisdiction profiles (default: the configured profiles)
        #[arg(long, value_name = "FILE")]
        jurisdictions: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: StageCommand, manifest: &EngineConfigManifest) -> Result<()> {
    match command {
        StageCommand::Check {
            snapshot,
            deal,
            to,
            jurisdictions,
            json,
        } => check(manifest, snapshot, &deal, &to, jurisdictions, json).await,
    }
}

async fn check(
    manifest: &EngineConfigManifest,
    snapshot: PathBuf,
    deal: &str,
    to: &str,
    jurisdictions: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let deal_id = DealId::from_string(deal).with_context(|| format!("Invalid deal id '{}'", deal))?;
    let target: LegalStage = to.parse()?;
    let gateway = Snapshot::from_json_file(&snapshot)?.into_gateway().await?;

    let mut builder = LifecycleEngine::builder(manifest.spec.clone()).gateway(Arc::new(gateway));
    if let Some(path) = jurisdictions {
        let provider = YamlJurisdictionProvider::from_yaml_file(&path)
            .with_context(|| format!("Failed to load jurisdiction profiles {:?}", path))?;
        builder = builder.jurisdictions(Arc::new(provider));
    }
    let (engine, _channels) = builder.build()?;

    let validation = engine.stages().preview_stage_transition(deal_id, target).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&validation)?);
    } else {
        print_validation(&validation);
    }

    if !validation.is_allowed() {
        anyhow::bail!(
            "Transition {} -> {} is blocked by {} requirement(s)",
            validation.from,
            validation.to,
            validation.blockers.len()
        );
    }
    Ok(())
}

fn print_validation(validation: &StageValidation) {
    let rollback = if validation.is_rollback { " (rollback)" } else { "" };
    println!("{}", format!("{} -> {}{}", validation.from, validation.to, rollback).bold());

    if validation.is_allowed() {
        println!("{}", "✓ Transition allowed".green());
    } else {
        println!("{}", "✗ Transition blocked:".red());
        for blocker in &validation.blockers {
            println!("  - {}", blocker.message);
        }
    }

    if !validation.warnings.is_empty() {
        println!("{}", "Warnings:".yellow());
        for warning in &validation.warnings {
            println!("  - {}", warning.message);
        }
    }
}
