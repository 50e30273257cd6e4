// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Legal Stage Use Cases
//!
//! Advances a deal through the closing process and records the metadata and
//! issues the closing depends on.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Gate stage moves on jurisdiction rules; upsert metadata; track issues
//! - **Collaborators:**
//!   - Domain: `validate_stage_change`, DealMetadata, DealIssue
//!   - Infrastructure: PersistenceGateway, JurisdictionRuleProvider, EffectDispatcher
//!
//! `advance_stage` validates again inside its transaction, against the stage
//! and metadata it is about to overwrite, so a preview taken earlier can never
//! authorize a stale move.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::post_commit::{EffectDispatcher, PostCommitEffects};
use crate::application::record_operation;
use crate::domain::deal::{Deal, DealId};
use crate::domain::errors::{EntityKind, LifecycleError};
use crate::domain::events::{DomainEventRecord, EventType, RealtimeEvent};
use crate::domain::identity::UserId;
use crate::domain::issue::{DealIssue, IssueId, NewIssueInput};
use crate::domain::jurisdiction::{validate_stage_change, JurisdictionRuleProvider, StageIssue, StageValidation};
use crate::domain::lead::Lead;
use crate::domain::legal_stage::LegalStage;
use crate::domain::metadata::{
    AssignmentMetadataPatch, ContractMetadataPatch, DealMetadata, MetadataCategory, TitleMetadataPatch,
};
use crate::domain::repository::{PersistenceGateway, Transaction};

/// Outcome of a committed stage move
#[derive(Debug, Clone, Serialize)]
pub struct StageAdvance {
    pub deal: Deal,
    pub previous_stage: LegalStage,
    pub is_rollback: bool,
    /// Advisory only; never blocked the move
    pub warnings: Vec<StageIssue>,
}

#[async_trait]
pub trait LegalStageService: Send + Sync {
    /// Move the deal to `target`
    ///
    /// # Errors
    ///
    /// - `NotFound` if the deal does not exist
    /// - `StageTransitionBlocked` when the structural check or a required
    ///   jurisdiction field fails; carries every blocker message
    async fn advance_stage(&self, deal_id: DealId, target: LegalStage, user_id: UserId) -> Result<StageAdvance, LifecycleError>;

    /// Same validation as `advance_stage`, without writing
    async fn preview_stage_transition(&self, deal_id: DealId, target: LegalStage) -> Result<StageValidation, LifecycleError>;

    async fn upsert_contract_metadata(&self, deal_id: DealId, patch: ContractMetadataPatch, user_id: UserId) -> Result<DealMetadata, LifecycleError>;

    async fn upsert_assignment_metadata(&self, deal_id: DealId, patch: AssignmentMetadataPatch, user_id: UserId) -> Result<DealMetadata, LifecycleError>;

    async fn upsert_title_metadata(&self, deal_id: DealId, patch: TitleMetadataPatch, user_id: UserId) -> Result<DealMetadata, LifecycleError>;

    async fn get_metadata(&self, deal_id: DealId) -> Result<DealMetadata, LifecycleError>;

    async fn record_issue(&self, deal_id: DealId, input: NewIssueInput, user_id: UserId) -> Result<DealIssue, LifecycleError>;

    /// Fails `InvalidState` when the issue is already resolved
    async fn resolve_issue(&self, issue_id: IssueId, user_id: UserId) -> Result<DealIssue, LifecycleError>;

    async fn list_issues(&self, deal_id: DealId) -> Result<Vec<DealIssue>, LifecycleError>;
}

pub struct StandardLegalStageService {
    gateway: Arc<dyn PersistenceGateway>,
    jurisdictions: Arc<dyn JurisdictionRuleProvider>,
    dispatcher: Arc<EffectDispatcher>,
}

impl StandardLegalStageService {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        jurisdictions: Arc<dyn JurisdictionRuleProvider>,
        dispatcher: Arc<EffectDispatcher>,
    ) -> Self {
        Self {
            gateway,
            jurisdictions,
            dispatcher,
        }
    }

    async fn load_deal(tx: &mut Box<dyn Transaction>, deal_id: DealId) -> Result<Deal, LifecycleError> {
        tx.find_deal(deal_id)
            .await?
            .ok_or_else(|| LifecycleError::deal_not_found(deal_id))
    }

    /// Full validation for `deal` against the parent lead's location
    async fn validate(
        &self,
        deal: &Deal,
        lead: Option<&Lead>,
        metadata: &DealMetadata,
        target: LegalStage,
    ) -> Result<StageValidation, LifecycleError> {
        let (state, county) = match lead {
            Some(lead) => (lead.address.state.as_str(), lead.address.county.as_deref()),
            None => ("unknown", None),
        };
        let profile = match lead {
            Some(_) => self.jurisdictions.get_profile(state, county).await?,
            None => None,
        };
        debug!(
            deal_id = %deal.id,
            state,
            county = ?county,
            has_profile = profile.is_some(),
            "Validating stage transition"
        );
        Ok(validate_stage_change(deal, target, state, profile.as_ref(), metadata))
    }

    async fn upsert_metadata<F>(
        &self,
        deal_id: DealId,
        category: MetadataCategory,
        user_id: UserId,
        apply: F,
    ) -> Result<DealMetadata, LifecycleError>
    where
        F: FnOnce(&mut DealMetadata) -> Vec<&'static str> + Send,
    {
        let mut tx = self.gateway.begin().await?;
        let deal = Self::load_deal(&mut tx, deal_id).await?;
        let mut metadata = tx.find_metadata(deal_id).await?;

        let changed = apply(&mut metadata);
        tx.save_metadata(deal_id, &metadata).await?;
        tx.append_event(DomainEventRecord::new(
            deal.org_id,
            deal.id.0,
            category.updated_event(),
            json!({ "changed_fields": changed, "actor": user_id }),
        ))
        .await?;
        tx.commit().await?;

        info!(deal_id = %deal_id, category = %category, changed = ?changed, "Deal metadata upserted");
        record_operation("metadata_upsert");

        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(deal.org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::MetadataUpdated { deal_id, category }),
            )
            .await;
        Ok(metadata)
    }
}

#[async_trait]
impl LegalStageService for StandardLegalStageService {
    async fn advance_stage(&self, deal_id: DealId, target: LegalStage, user_id: UserId) -> Result<StageAdvance, LifecycleError> {
        let mut tx = self.gateway.begin().await?;

        // Step 1: Read everything the validation depends on inside the transaction
        let mut deal = Self::load_deal(&mut tx, deal_id).await?;
        let lead = tx.find_lead(deal.lead_id).await?;
        let metadata = tx.find_metadata(deal_id).await?;

        // Step 2: Structural and jurisdiction checks
        let validation = self.validate(&deal, lead.as_ref(), &metadata, target).await?;
        if !validation.is_allowed() {
            debug!(deal_id = %deal_id, to = %target, blockers = validation.blockers.len(), "Stage transition blocked");
            return Err(LifecycleError::StageTransitionBlocked {
                from: deal.stage,
                to: target,
                blockers: validation.blocker_messages(),
            });
        }

        // Step 3: Write the stage and the audit event
        let previous_stage = deal.stage;
        deal.set_stage(target);
        tx.save_deal(&deal).await?;
        tx.append_event(DomainEventRecord::new(
            deal.org_id,
            deal.id.0,
            EventType::StageTransition,
            json!({
                "from": previous_stage,
                "to": target,
                "actor": user_id,
                "is_rollback": validation.is_rollback,
            }),
        ))
        .await?;
        tx.commit().await?;

        info!(
            deal_id = %deal.id,
            from = %previous_stage,
            to = %target,
            is_rollback = validation.is_rollback,
            "Deal stage changed"
        );
        record_operation("stage_advance");

        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(deal.org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::StageChanged {
                        deal_id: deal.id,
                        from: previous_stage,
                        to: target,
                        is_rollback: validation.is_rollback,
                    }),
            )
            .await;

        Ok(StageAdvance {
            deal,
            previous_stage,
            is_rollback: validation.is_rollback,
            warnings: validation.warnings,
        })
    }

    async fn preview_stage_transition(&self, deal_id: DealId, target: LegalStage) -> Result<StageValidation, LifecycleError> {
        let deal = self
            .gateway
            .find_deal(deal_id)
            .await?
            .ok_or_else(|| LifecycleError::deal_not_found(deal_id))?;
        let lead = self.gateway.find_lead(deal.lead_id).await?;
        let metadata = self.gateway.find_metadata(deal_id).await?;
        self.validate(&deal, lead.as_ref(), &metadata, target).await
    }

    async fn upsert_contract_metadata(&self, deal_id: DealId, patch: ContractMetadataPatch, user_id: UserId) -> Result<DealMetadata, LifecycleError> {
        self.upsert_metadata(deal_id, MetadataCategory::Contract, user_id, move |metadata| {
            let (record, changed) = patch.apply(metadata.contract.take());
            metadata.contract = Some(record);
            changed
        })
        .await
    }

    async fn upsert_assignment_metadata(&self, deal_id: DealId, patch: AssignmentMetadataPatch, user_id: UserId) -> Result<DealMetadata, LifecycleError> {
        self.upsert_metadata(deal_id, MetadataCategory::Assignment, user_id, move |metadata| {
            let (record, changed) = patch.apply(metadata.assignment.take());
            metadata.assignment = Some(record);
            changed
        })
        .await
    }

    async fn upsert_title_metadata(&self, deal_id: DealId, patch: TitleMetadataPatch, user_id: UserId) -> Result<DealMetadata, LifecycleError> {
        self.upsert_metadata(deal_id, MetadataCategory::Title, user_id, move |metadata| {
            let (record, changed) = patch.apply(metadata.title.take());
            metadata.title = Some(record);
            changed
        })
        .await
    }

    async fn get_metadata(&self, deal_id: DealId) -> Result<DealMetadata, LifecycleError> {
        if self.gateway.find_deal(deal_id).await?.is_none() {
            return Err(LifecycleError::deal_not_found(deal_id));
        }
        Ok(self.gateway.find_metadata(deal_id).await?)
    }

    async fn record_issue(&self, deal_id: DealId, input: NewIssueInput, user_id: UserId) -> Result<DealIssue, LifecycleError> {
        let issue = DealIssue::record(deal_id, input)?;

        let mut tx = self.gateway.begin().await?;
        let deal = Self::load_deal(&mut tx, deal_id).await?;
        tx.save_issue(&issue).await?;
        tx.append_event(DomainEventRecord::new(
            deal.org_id,
            deal.id.0,
            EventType::IssueRecorded,
            json!({
                "issue_id": issue.id,
                "title": issue.title,
                "severity": issue.severity,
                "actor": user_id,
            }),
        ))
        .await?;
        tx.commit().await?;

        info!(deal_id = %deal_id, issue_id = %issue.id, severity = ?issue.severity, "Deal issue recorded");
        record_operation("issue_record");

        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(deal.org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::IssueChanged {
                        deal_id,
                        issue_id: issue.id,
                        resolved: false,
                    }),
            )
            .await;
        Ok(issue)
    }

    async fn resolve_issue(&self, issue_id: IssueId, user_id: UserId) -> Result<DealIssue, LifecycleError> {
        let mut tx = self.gateway.begin().await?;
        let mut issue = tx.find_issue(issue_id).await?.ok_or(LifecycleError::NotFound {
            entity: EntityKind::Issue,
            id: issue_id.0,
        })?;
        issue.resolve(Utc::now())?;
        let deal = Self::load_deal(&mut tx, issue.deal_id).await?;

        tx.save_issue(&issue).await?;
        tx.append_event(DomainEventRecord::new(
            deal.org_id,
            deal.id.0,
            EventType::IssueResolved,
            json!({ "issue_id": issue.id, "actor": user_id }),
        ))
        .await?;
        tx.commit().await?;

        info!(deal_id = %deal.id, issue_id = %issue.id, "Deal issue resolved");
        record_operation("issue_resolve");

        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(deal.org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::IssueChanged {
                        deal_id: deal.id,
                        issue_id: issue.id,
                        resolved: true,
                    }),
            )
            .await;
        Ok(issue)
    }

    async fn list_issues(&self, deal_id: DealId) -> Result<Vec<DealIssue>, LifecycleError> {
        Ok(self.gateway.list_issues(deal_id).await?)
    }
}
