// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Offline needs-attention scan over a snapshot

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use dealflow_core::application::LifecycleEngine;
use dealflow_core::domain::attention::AttentionSignal;
use dealflow_core::domain::engine_config::EngineConfigManifest;
use dealflow_core::domain::identity::OrgId;

use crate::snapshot::Snapshot;

#[derive(Args)]
pub struct AttentionArgs {
    /// JSON snapshot to scan
    #[arg(long, value_name = "FILE")]
    pub snapshot: PathBuf,

    /// Only scan this organization (default: every organization with deals)
    #[arg(long, value_name = "ORG_ID")]
    pub org: Option<String>,

    /// Evaluate as of this RFC 3339 instant instead of now
    #[arg(long, value_name = "RFC3339")]
    pub now: Option<DateTime<Utc>>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: AttentionArgs, manifest: &EngineConfigManifest) -> Result<()> {
    let snapshot = Snapshot::from_json_file(&args.snapshot)?;
    let orgs = match &args.org {
        Some(raw) => vec![OrgId::from_string(raw).with_context(|| format!("Invalid organization id '{}'", raw))?],
        None => snapshot.deal_orgs(),
    };
    let gateway = snapshot.into_gateway().await?;

    let (engine, _channels) = LifecycleEngine::builder(manifest.spec.clone())
        .gateway(Arc::new(gateway))
        .build()?;
    let now = args.now.unwrap_or_else(Utc::now);

    let mut signals: Vec<AttentionSignal> = Vec::new();
    for org_id in &orgs {
        signals.extend(engine.attention().scan_at(*org_id, now).await?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&signals)?);
        return Ok(());
    }

    if signals.is_empty() {
        println!("{}", "✓ No deals need attention".green());
        return Ok(());
    }

    println!(
        "{}",
        format!("{} signal(s) across {} organization(s):", signals.len(), orgs.len()).bold()
    );
    let mut current = None;
    for signal in &signals {
        if current != Some(signal.deal_id) {
            println!("  Deal {}", signal.deal_id.to_string().bold());
            current = Some(signal.deal_id);
        }
        println!("    {} {}", signal.signal.as_str().yellow(), signal.message);
    }
    Ok(())
}
