// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Jurisdiction Validation
//!
//! Location-specific rules for legal-stage transitions. A profile lists, per
//! target stage, the metadata fields that must be filled in before a deal may
//! enter that stage. A location without a profile has no extra requirements.
//!
//! Two pure checks compose with the structural stage check:
//!
//! - [`check_required_fields`] produces blocking issues.
//! - [`advisory_warnings`] produces reminders that never block.
//!
//! [`validate_stage_change`] combines all three into a [`StageValidation`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::deal::Deal;
use crate::domain::legal_stage::{validate_stage_transition, LegalStage};
use crate::domain::metadata::{DealMetadata, FieldPath, MetadataCategory};
use crate::domain::repository::RepositoryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingRule {
    pub stage: LegalStage,
    pub reminder: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionFlags {
    /// Closings must be conducted by a licensed attorney
    #[serde(default)]
    pub attorney_closing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionProfile {
    /// Two-letter state code
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(default)]
    pub required_fields: HashMap<LegalStage, Vec<FieldPath>>,
    #[serde(default)]
    pub timing_rules: Vec<TimingRule>,
    #[serde(default)]
    pub flags: JurisdictionFlags,
}

impl JurisdictionProfile {
    pub fn required_for(&self, stage: LegalStage) -> &[FieldPath] {
        self.required_fields
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn location(&self) -> String {
        match &self.county {
            Some(county) => format!("{} ({})", self.state, county),
            None => self.state.clone(),
        }
    }
}

/// Lookup of jurisdiction profiles by location
#[async_trait]
pub trait JurisdictionRuleProvider: Send + Sync {
    /// Most specific profile for the location: county first, then state-wide
    async fn get_profile(
        &self,
        state: &str,
        county: Option<&str>,
    ) -> Result<Option<JurisdictionProfile>, RepositoryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageIssueKind {
    Structural,
    MissingRequiredField,
    NoJurisdictionProfile,
    DocumentReminder,
    TimingReminder,
    AttorneyClosing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageIssue {
    pub kind: StageIssueKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldPath>,
}

impl StageIssue {
    fn new(kind: StageIssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
        }
    }
}

/// Combined outcome of the structural and jurisdiction checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageValidation {
    pub from: LegalStage,
    pub to: LegalStage,
    pub is_rollback: bool,
    pub blockers: Vec<StageIssue>,
    pub warnings: Vec<StageIssue>,
}

impl StageValidation {
    pub fn is_allowed(&self) -> bool {
        self.blockers.is_empty()
    }

    pub fn blocker_messages(&self) -> Vec<String> {
        self.blockers.iter().map(|b| b.message.clone()).collect()
    }
}

/// Blocking check of the target stage's required fields. No profile means
/// no requirements.
pub fn check_required_fields(
    target: LegalStage,
    profile: Option<&JurisdictionProfile>,
    metadata: &DealMetadata,
) -> Vec<StageIssue> {
    let Some(profile) = profile else {
        return Vec::new();
    };
    profile
        .required_for(target)
        .iter()
        .filter(|path| !metadata.is_field_set(path))
        .map(|path| StageIssue {
            kind: StageIssueKind::MissingRequiredField,
            message: format!("{} is required before {} in {}", path, target, profile.location()),
            field: Some(path.clone()),
        })
        .collect()
}

/// Non-blocking reminders for a move to `target`
pub fn advisory_warnings(
    target: LegalStage,
    state: &str,
    profile: Option<&JurisdictionProfile>,
    metadata: &DealMetadata,
) -> Vec<StageIssue> {
    let mut warnings = Vec::new();

    match profile {
        None => warnings.push(StageIssue::new(
            StageIssueKind::NoJurisdictionProfile,
            format!(
                "no jurisdiction rules configured for {}; no additional requirements were applied",
                state
            ),
        )),
        Some(profile) => {
            for rule in profile.timing_rules.iter().filter(|r| r.stage == target) {
                warnings.push(StageIssue::new(StageIssueKind::TimingReminder, rule.reminder.clone()));
            }
            if profile.flags.attorney_closing
                && matches!(target, LegalStage::ClearedToClose | LegalStage::Closed)
            {
                warnings.push(StageIssue::new(
                    StageIssueKind::AttorneyClosing,
                    format!("{} requires an attorney to conduct the closing", profile.location()),
                ));
            }
        }
    }

    if target != LegalStage::Dead {
        for (category, from_stage) in [
            (MetadataCategory::Contract, LegalStage::UnderContract),
            (MetadataCategory::Assignment, LegalStage::Assigned),
            (MetadataCategory::Title, LegalStage::ClearedToClose),
        ] {
            if target.position() >= from_stage.position() && !metadata.has_document(category) {
                warnings.push(StageIssue {
                    kind: StageIssueKind::DocumentReminder,
                    message: format!("attach the signed {} document link", category),
                    field: Some(FieldPath::new(category, "documentUrl")),
                });
            }
        }
    }

    warnings
}

/// Structural check, then required fields (skipped for rollbacks and `DEAD`),
/// then advisory warnings.
pub fn validate_stage_change(
    deal: &Deal,
    target: LegalStage,
    state: &str,
    profile: Option<&JurisdictionProfile>,
    metadata: &DealMetadata,
) -> StageValidation {
    let from = deal.stage;
    let check = match validate_stage_transition(deal, target) {
        Ok(check) => check,
        Err(rejection) => {
            return StageValidation {
                from,
                to: target,
                is_rollback: target.position() < from.position(),
                blockers: vec![StageIssue::new(StageIssueKind::Structural, rejection.to_string())],
                warnings: Vec::new(),
            }
        }
    };

    let blockers = if check.is_rollback || target == LegalStage::Dead {
        Vec::new()
    } else {
        check_required_fields(target, profile, metadata)
    };
    let warnings = if check.is_rollback {
        Vec::new()
    } else {
        advisory_warnings(target, state, profile, metadata)
    };

    StageValidation {
        from,
        to: target,
        is_rollback: check.is_rollback,
        blockers,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deal::{DealType, NewDeal};
    use crate::domain::identity::{OrgId, UserId};
    use crate::domain::lead::LeadId;
    use crate::domain::metadata::AssignmentMetadata;
    use rust_decimal::Decimal;

    fn deal_at(stage: LegalStage) -> Deal {
        let mut deal = Deal::open(NewDeal {
            org_id: OrgId::new(),
            lead_id: LeadId::new(),
            created_by: UserId::new(),
            deal_type: DealType::Assignment,
            buyer_name: None,
            assignment_fee: Decimal::ZERO,
        });
        deal.stage = stage;
        deal
    }

    fn texas() -> JurisdictionProfile {
        serde_yaml::from_str(
            r#"
state: TX
required_fields:
  ASSIGNED: [assignment.assigneeName, assignment.assignmentFee]
  CLOSED: [title.titleCompany]
timing_rules:
  - stage: TITLE_CLEARING
    reminder: Order the title commitment within 5 days
flags:
  attorney_closing: true
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_field_path_rejected_at_load() {
        let result: Result<JurisdictionProfile, _> = serde_yaml::from_str(
            "state: TX\nrequired_fields:\n  ASSIGNED: [assignment.buyerPhone]\n",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_required_fields_block() {
        let profile = texas();
        let mut metadata = DealMetadata::default();
        let blockers = check_required_fields(LegalStage::Assigned, Some(&profile), &metadata);
        assert_eq!(blockers.len(), 2);
        assert!(blockers.iter().all(|b| b.kind == StageIssueKind::MissingRequiredField));

        metadata.assignment = Some(AssignmentMetadata {
            assignee_name: Some("Buyer LLC".to_string()),
            assignment_fee: Some(Decimal::from(9000)),
            ..AssignmentMetadata::default()
        });
        assert!(check_required_fields(LegalStage::Assigned, Some(&profile), &metadata).is_empty());
    }

    #[test]
    fn test_no_profile_is_permissive_with_warning() {
        let deal = deal_at(LegalStage::PreContract);
        let validation = validate_stage_change(&deal, LegalStage::Closed, "OH", None, &DealMetadata::default());
        assert!(validation.is_allowed());
        assert!(validation
            .warnings
            .iter()
            .any(|w| w.kind == StageIssueKind::NoJurisdictionProfile));
    }

    #[test]
    fn test_rollback_skips_requirements() {
        let profile = texas();
        let deal = deal_at(LegalStage::TitleClearing);
        let validation =
            validate_stage_change(&deal, LegalStage::Assigned, "TX", Some(&profile), &DealMetadata::default());
        assert!(validation.is_rollback);
        assert!(validation.is_allowed());
    }

    #[test]
    fn test_structural_rejection_is_a_blocker() {
        let deal = deal_at(LegalStage::Dead);
        let validation =
            validate_stage_change(&deal, LegalStage::Closed, "TX", None, &DealMetadata::default());
        assert!(!validation.is_allowed());
        assert_eq!(validation.blockers[0].kind, StageIssueKind::Structural);
    }

    #[test]
    fn test_advisories_for_closing_targets() {
        let profile = texas();
        let warnings = advisory_warnings(LegalStage::Closed, "TX", Some(&profile), &DealMetadata::default());
        assert!(warnings.iter().any(|w| w.kind == StageIssueKind::AttorneyClosing));
        assert_eq!(
            warnings
                .iter()
                .filter(|w| w.kind == StageIssueKind::DocumentReminder)
                .count(),
            3
        );

        let warnings =
            advisory_warnings(LegalStage::TitleClearing, "TX", Some(&profile), &DealMetadata::default());
        assert!(warnings.iter().any(|w| w.kind == StageIssueKind::TimingReminder));
        assert!(!warnings.iter().any(|w| w.kind == StageIssueKind::AttorneyClosing));
    }
}
