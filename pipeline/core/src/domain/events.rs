// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::automation::TriggerType;
use crate::domain::deal::DealId;
use crate::domain::identity::OrgId;
use crate::domain::issue::IssueId;
use crate::domain::lead::{LeadId, LeadStatus};
use crate::domain::legal_stage::LegalStage;
use crate::domain::metadata::MetadataCategory;

/// Event types of the append-only domain event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    LeadCreated,
    LeadUpdated,
    QualificationChanged,
    StatusChange,
    LeadPurged,
    DealCreated,
    DealClosed,
    DealCancelled,
    StageTransition,
    ContractMetadataUpdated,
    AssignmentMetadataUpdated,
    TitleMetadataUpdated,
    IssueRecorded,
    IssueResolved,
    AutomationExecuted,
    ContactLogged,
    NoteAdded,
    DealFlagged,
    LeadFlagged,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadCreated => "lead_created",
            Self::LeadUpdated => "lead_updated",
            Self::QualificationChanged => "qualification_changed",
            Self::StatusChange => "status_change",
            Self::LeadPurged => "lead_purged",
            Self::DealCreated => "deal_created",
            Self::DealClosed => "deal_closed",
            Self::DealCancelled => "deal_cancelled",
            Self::StageTransition => "stage_transition",
            Self::ContractMetadataUpdated => "contract_metadata_updated",
            Self::AssignmentMetadataUpdated => "assignment_metadata_updated",
            Self::TitleMetadataUpdated => "title_metadata_updated",
            Self::IssueRecorded => "issue_recorded",
            Self::IssueResolved => "issue_resolved",
            Self::AutomationExecuted => "automation_executed",
            Self::ContactLogged => "contact_logged",
            Self::NoteAdded => "note_added",
            Self::DealFlagged => "deal_flagged",
            Self::LeadFlagged => "lead_flagged",
        }
    }

    /// Written by automation rules rather than by a user-driven change
    pub fn is_automation_output(&self) -> bool {
        matches!(self, Self::AutomationExecuted | Self::DealFlagged | Self::LeadFlagged)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable domain event log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEventRecord {
    pub id: Uuid,
    pub org_id: OrgId,
    /// Lead or deal the event is about
    pub subject_id: Uuid,
    pub event_type: EventType,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEventRecord {
    pub fn new(
        org_id: OrgId,
        subject_id: Uuid,
        event_type: EventType,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id,
            subject_id,
            event_type,
            metadata,
            occurred_at: Utc::now(),
        }
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// Payload pushed to connected clients after a committed change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    LeadCreated {
        lead_id: LeadId,
    },
    LeadUpdated {
        lead_id: LeadId,
        fields: Vec<String>,
    },
    LeadQualificationChanged {
        lead_id: LeadId,
        is_qualified: bool,
    },
    LeadStatusChanged {
        lead_id: LeadId,
        from: LeadStatus,
        to: LeadStatus,
    },
    LeadPurged {
        lead_id: LeadId,
    },
    DealCreated {
        deal_id: DealId,
        lead_id: LeadId,
    },
    DealClosed {
        deal_id: DealId,
        profit: Decimal,
    },
    DealCancelled {
        deal_id: DealId,
    },
    StageChanged {
        deal_id: DealId,
        from: LegalStage,
        to: LegalStage,
        is_rollback: bool,
    },
    MetadataUpdated {
        deal_id: DealId,
        category: MetadataCategory,
    },
    IssueChanged {
        deal_id: DealId,
        issue_id: IssueId,
        resolved: bool,
    },
    AutomationTriggered {
        rule_id: String,
        rule_name: String,
        trigger: TriggerType,
        subject_id: Uuid,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessage {
    pub org_id: OrgId,
    pub event: RealtimeEvent,
    pub emitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    DealClosed,
    Automation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub org_id: OrgId,
    pub category: NotificationCategory,
    pub message: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}
