// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Automation Rule Contract
//!
//! A rule reacts to one [`TriggerType`]. The engine selects enabled rules for
//! the trigger, evaluates [`AutomationRule::matches`] and, when it holds, runs
//! [`AutomationRule::execute`]. Rules are stateless: everything they need is
//! in the [`TriggerContext`]. They describe what should happen as
//! [`RuleEffect`]s and the engine carries those out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::deal::{Deal, DealId};
use crate::domain::identity::{OrgId, UserId};
use crate::domain::lead::{Lead, LeadId, LeadStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    LeadCreated,
    LeadUpdated,
    QualificationChanged,
    StatusChange,
    DealCreated,
    DealClosed,
    LeadStale,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadCreated => "lead_created",
            Self::LeadUpdated => "lead_updated",
            Self::QualificationChanged => "qualification_changed",
            Self::StatusChange => "status_change",
            Self::DealCreated => "deal_created",
            Self::DealClosed => "deal_closed",
            Self::LeadStale => "lead_stale",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Committed change that fired a trigger, carrying post-commit state
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    LeadCreated {
        lead: Lead,
    },
    LeadUpdated {
        lead: Lead,
        fields: Vec<String>,
    },
    QualificationChanged {
        lead: Lead,
        previous: bool,
    },
    StatusChange {
        lead: Lead,
        from: LeadStatus,
        to: LeadStatus,
    },
    DealCreated {
        deal: Deal,
        lead: Lead,
    },
    DealClosed {
        deal: Deal,
    },
    LeadStale {
        lead: Lead,
        idle_days: i64,
    },
}

impl TriggerEvent {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::LeadCreated { .. } => TriggerType::LeadCreated,
            Self::LeadUpdated { .. } => TriggerType::LeadUpdated,
            Self::QualificationChanged { .. } => TriggerType::QualificationChanged,
            Self::StatusChange { .. } => TriggerType::StatusChange,
            Self::DealCreated { .. } => TriggerType::DealCreated,
            Self::DealClosed { .. } => TriggerType::DealClosed,
            Self::LeadStale { .. } => TriggerType::LeadStale,
        }
    }

    pub fn subject(&self) -> SubjectRef {
        match self {
            Self::LeadCreated { lead }
            | Self::LeadUpdated { lead, .. }
            | Self::QualificationChanged { lead, .. }
            | Self::StatusChange { lead, .. }
            | Self::LeadStale { lead, .. } => SubjectRef::Lead(lead.id),
            Self::DealCreated { deal, .. } | Self::DealClosed { deal } => SubjectRef::Deal(deal.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SubjectRef {
    Lead(LeadId),
    Deal(DealId),
}

impl SubjectRef {
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Lead(id) => id.0,
            Self::Deal(id) => id.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub org_id: OrgId,
    pub actor: UserId,
    pub event: TriggerEvent,
    pub occurred_at: DateTime<Utc>,
}

impl TriggerContext {
    pub fn new(org_id: OrgId, actor: UserId, event: TriggerEvent) -> Self {
        Self {
            org_id,
            actor,
            event,
            occurred_at: Utc::now(),
        }
    }

    pub fn trigger_type(&self) -> TriggerType {
        self.event.trigger_type()
    }

    pub fn subject(&self) -> SubjectRef {
        self.event.subject()
    }
}

/// Outcome requested by a rule action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum RuleEffect {
    LogContact { lead_id: LeadId, note: String },
    AddNote { subject: SubjectRef, note: String },
    FlagDeal { deal_id: DealId, reason: String },
    FlagLead { lead_id: LeadId, reason: String },
}

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("rule {rule} predicate failed: {reason}")]
    Predicate { rule: String, reason: String },

    #[error("rule {rule} action failed: {reason}")]
    Action { rule: String, reason: String },

    #[error("rule {rule} received a {trigger} context it cannot handle")]
    UnexpectedContext { rule: String, trigger: TriggerType },

    #[error("rule {0} panicked")]
    Panicked(String),
}

/// A registered automation rule
pub trait AutomationRule: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn trigger(&self) -> TriggerType;

    fn enabled_by_default(&self) -> bool {
        true
    }

    fn matches(&self, ctx: &TriggerContext) -> Result<bool, AutomationError>;

    fn execute(&self, ctx: &TriggerContext) -> Result<Vec<RuleEffect>, AutomationError>;
}
