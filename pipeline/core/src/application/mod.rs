// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod automation_engine;
pub mod builtin_rules;
pub mod post_commit;
pub mod lead_lifecycle;
pub mod deal_lifecycle;
pub mod legal_stage_service;
pub mod needs_attention;
pub mod event_log_flusher;
pub mod engine;

// Re-export use cases for convenience
pub use automation_engine::{AutomationEngine, AutomationReport, RuleDescriptor, RuleRegistry};
pub use deal_lifecycle::{DealLifecycleService, StandardDealLifecycleService};
pub use engine::{EngineChannels, LifecycleEngine, LifecycleEngineBuilder};
pub use lead_lifecycle::{LeadLifecycleService, StaleSweepReport, StandardLeadLifecycleService};
pub use legal_stage_service::{LegalStageService, StageAdvance, StandardLegalStageService};
pub use needs_attention::NeedsAttentionAggregator;
pub use post_commit::{DispatchOutcome, EffectDispatcher, PostCommitEffects};

/// Count one committed lifecycle operation
pub(crate) fn record_operation(operation: &'static str) {
    metrics::counter!("dealflow_lifecycle_operations_total", "operation" => operation).increment(1);
}
