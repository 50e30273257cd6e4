// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures for the lifecycle integration tests.

#![allow(dead_code)]

use dealflow_core::application::{EngineChannels, LeadLifecycleService, LifecycleEngine};
use dealflow_core::domain::engine_config::EngineConfigSpec;
use dealflow_core::domain::identity::{OrgId, UserId};
use dealflow_core::domain::lead::{Lead, LeadInput, LeadStatus};
use dealflow_core::infrastructure::InMemoryPersistenceGateway;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Engine over `gateway` with default configuration
pub fn engine(gateway: &InMemoryPersistenceGateway) -> (LifecycleEngine, EngineChannels) {
    engine_with(gateway, EngineConfigSpec::default())
}

pub fn engine_with(gateway: &InMemoryPersistenceGateway, config: EngineConfigSpec) -> (LifecycleEngine, EngineChannels) {
    LifecycleEngine::builder(config)
        .gateway(Arc::new(gateway.clone()))
        .build()
        .expect("engine should build")
}

/// 300k ARV, 40k repairs, no offer yet
pub fn lead_input(street: &str, state: &str) -> LeadInput {
    LeadInput {
        street: street.to_string(),
        city: "Springfield".to_string(),
        state: state.to_string(),
        zip: "62701".to_string(),
        seller_name: Some("Jordan Seller".to_string()),
        arv: Some(dec!(300000)),
        estimated_repairs: Some(dec!(40000)),
        ..LeadInput::default()
    }
}

/// A lead moved to `qualified` and flagged qualified
pub async fn qualified_lead(engine: &LifecycleEngine, org_id: OrgId, street: &str, state: &str) -> Lead {
    let lead = engine
        .leads()
        .create(org_id, UserId::new(), lead_input(street, state))
        .await
        .expect("lead should be created");
    engine
        .leads()
        .update_status(lead.id, LeadStatus::Qualified)
        .await
        .expect("new -> qualified is allowed");
    engine
        .leads()
        .qualify(lead.id, true)
        .await
        .expect("lead should be qualified")
}
