// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lead Lifecycle Use Cases
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Create, update, qualify, transition, delete and purge leads
//! - **Collaborators:**
//!   - Domain: Lead aggregate (normalization, status graph, underwriting)
//!   - Infrastructure: PersistenceGateway, EffectDispatcher
//!
//! # Flow
//!
//! 1. Open one transaction
//! 2. Load, validate and mutate the lead through the aggregate
//! 3. Save the lead and append the domain event in the same transaction
//! 4. Commit
//! 5. Hand cache invalidation, realtime broadcast and automation to the
//!    post-commit dispatcher
//!
//! Errors from steps 1-4 are returned as [`LifecycleError`]; nothing in step 5
//! can fail the operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::post_commit::{EffectDispatcher, PostCommitEffects};
use crate::application::record_operation;
use crate::domain::automation::{TriggerContext, TriggerEvent};
use crate::domain::engine_config::UnderwritingConfig;
use crate::domain::errors::LifecycleError;
use crate::domain::events::{DomainEventRecord, EventType, RealtimeEvent};
use crate::domain::identity::{OrgId, UserId};
use crate::domain::lead::{DealReadiness, Lead, LeadId, LeadInput, LeadPatch, LeadStatus};
use crate::domain::repository::{PersistenceGateway, Transaction};

/// Result of one stale-lead sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleSweepReport {
    /// Non-terminal leads handed to the `lead_stale` trigger
    pub leads_scanned: usize,
    pub rules_executed: usize,
    pub rule_failures: usize,
}

#[async_trait]
pub trait LeadLifecycleService: Send + Sync {
    /// Create a lead after per-organization duplicate detection
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed address parts or money values
    /// - `DuplicateLead` when the org already has a lead at this address
    async fn create(&self, org_id: OrgId, user_id: UserId, input: LeadInput) -> Result<Lead, LifecycleError>;

    /// Merge a partial update. Financial inputs recompute the derived
    /// underwriting outputs; address changes re-run duplicate detection.
    async fn update(&self, lead_id: LeadId, patch: LeadPatch) -> Result<Lead, LifecycleError>;

    async fn qualify(&self, lead_id: LeadId, is_qualified: bool) -> Result<Lead, LifecycleError>;

    /// Move the lead along the status graph. `dead` is always reachable.
    async fn update_status(&self, lead_id: LeadId, status: LeadStatus) -> Result<Lead, LifecycleError>;

    /// Soft delete: a transition to `dead`
    async fn delete(&self, lead_id: LeadId) -> Result<Lead, LifecycleError>;

    /// Irreversible hard delete. Refused while an in-progress deal exists.
    async fn purge(&self, lead_id: LeadId) -> Result<(), LifecycleError>;

    async fn get(&self, lead_id: LeadId) -> Result<Lead, LifecycleError>;

    async fn list(&self, org_id: OrgId) -> Result<Vec<Lead>, LifecycleError>;

    async fn deal_readiness(&self, lead_id: LeadId) -> Result<DealReadiness, LifecycleError>;

    /// Fire the `lead_stale` trigger for every non-terminal lead in the org
    async fn sweep_stale_leads(&self, org_id: OrgId, now: DateTime<Utc>) -> Result<StaleSweepReport, LifecycleError>;
}

pub struct StandardLeadLifecycleService {
    gateway: Arc<dyn PersistenceGateway>,
    dispatcher: Arc<EffectDispatcher>,
    underwriting: UnderwritingConfig,
}

impl StandardLeadLifecycleService {
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        dispatcher: Arc<EffectDispatcher>,
        underwriting: UnderwritingConfig,
    ) -> Self {
        Self {
            gateway,
            dispatcher,
            underwriting,
        }
    }

    async fn load(tx: &mut Box<dyn Transaction>, lead_id: LeadId) -> Result<Lead, LifecycleError> {
        tx.find_lead(lead_id)
            .await?
            .ok_or_else(|| LifecycleError::lead_not_found(lead_id))
    }

    fn status_effects(lead: &Lead, from: LeadStatus, to: LeadStatus) -> PostCommitEffects {
        PostCommitEffects::for_org(lead.org_id)
            .invalidate_cache()
            .broadcast(RealtimeEvent::LeadStatusChanged {
                lead_id: lead.id,
                from,
                to,
            })
            .automation(TriggerContext::new(
                lead.org_id,
                UserId::system(),
                TriggerEvent::StatusChange {
                    lead: lead.clone(),
                    from,
                    to,
                },
            ))
    }
}

#[async_trait]
impl LeadLifecycleService for StandardLeadLifecycleService {
    async fn create(&self, org_id: OrgId, user_id: UserId, input: LeadInput) -> Result<Lead, LifecycleError> {
        // Step 1: Normalize and validate before touching the store
        let lead = Lead::create(org_id, user_id, input, &self.underwriting)?;

        // Step 2: Duplicate check and insert in one transaction
        let mut tx = self.gateway.begin().await?;
        if let Some(existing) = tx.find_lead_by_fingerprint(org_id, &lead.fingerprint).await? {
            debug!(existing_id = %existing.id, org_id = %org_id, "Duplicate lead rejected");
            return Err(LifecycleError::DuplicateLead { existing_id: existing.id });
        }
        tx.save_lead(&lead).await?;
        tx.append_event(DomainEventRecord::new(
            org_id,
            lead.id.0,
            EventType::LeadCreated,
            json!({
                "actor": user_id,
                "street": lead.address.street,
                "city": lead.address.city,
                "state": lead.address.state,
                "source": lead.source,
            }),
        ))
        .await?;
        tx.commit().await?;

        info!(lead_id = %lead.id, org_id = %org_id, "Lead created");
        record_operation("lead_create");

        // Step 3: Post-commit effects
        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::LeadCreated { lead_id: lead.id })
                    .automation(TriggerContext::new(
                        org_id,
                        user_id,
                        TriggerEvent::LeadCreated { lead: lead.clone() },
                    )),
            )
            .await;
        Ok(lead)
    }

    async fn update(&self, lead_id: LeadId, patch: LeadPatch) -> Result<Lead, LifecycleError> {
        let mut tx = self.gateway.begin().await?;
        let mut lead = Self::load(&mut tx, lead_id).await?;

        let changes = lead.apply_patch(patch)?;
        if changes.fields.is_empty() {
            debug!(lead_id = %lead_id, "Empty lead update ignored");
            return Self::load(&mut tx, lead_id).await;
        }

        if changes.address {
            if let Some(existing) = tx.find_lead_by_fingerprint(lead.org_id, &lead.fingerprint).await? {
                if existing.id != lead.id {
                    return Err(LifecycleError::DuplicateLead { existing_id: existing.id });
                }
            }
        }

        let fields: Vec<String> = changes.fields.iter().map(|f| f.to_string()).collect();
        tx.save_lead(&lead).await?;
        tx.append_event(DomainEventRecord::new(
            lead.org_id,
            lead.id.0,
            EventType::LeadUpdated,
            json!({
                "fields": fields,
                "financials_recomputed": changes.financials,
                "max_offer_amount": lead.max_offer_amount(),
            }),
        ))
        .await?;
        tx.commit().await?;

        info!(lead_id = %lead.id, fields = ?fields, "Lead updated");
        record_operation("lead_update");

        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(lead.org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::LeadUpdated {
                        lead_id: lead.id,
                        fields: fields.clone(),
                    })
                    .automation(TriggerContext::new(
                        lead.org_id,
                        UserId::system(),
                        TriggerEvent::LeadUpdated {
                            lead: lead.clone(),
                            fields,
                        },
                    )),
            )
            .await;
        Ok(lead)
    }

    async fn qualify(&self, lead_id: LeadId, is_qualified: bool) -> Result<Lead, LifecycleError> {
        let mut tx = self.gateway.begin().await?;
        let mut lead = Self::load(&mut tx, lead_id).await?;
        let unchanged = lead.clone();

        let previous = lead.set_qualified(is_qualified)?;
        if previous == is_qualified {
            return Ok(unchanged);
        }

        tx.save_lead(&lead).await?;
        tx.append_event(DomainEventRecord::new(
            lead.org_id,
            lead.id.0,
            EventType::QualificationChanged,
            json!({ "from": previous, "to": is_qualified }),
        ))
        .await?;
        tx.commit().await?;

        info!(lead_id = %lead.id, is_qualified, "Lead qualification changed");
        record_operation("lead_qualify");

        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(lead.org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::LeadQualificationChanged {
                        lead_id: lead.id,
                        is_qualified,
                    })
                    .automation(TriggerContext::new(
                        lead.org_id,
                        UserId::system(),
                        TriggerEvent::QualificationChanged {
                            lead: lead.clone(),
                            previous,
                        },
                    )),
            )
            .await;
        Ok(lead)
    }

    async fn update_status(&self, lead_id: LeadId, status: LeadStatus) -> Result<Lead, LifecycleError> {
        let mut tx = self.gateway.begin().await?;
        let mut lead = Self::load(&mut tx, lead_id).await?;

        if lead.status == LeadStatus::Dead && status == LeadStatus::Dead {
            debug!(lead_id = %lead_id, "Lead already dead");
            return Ok(lead);
        }

        let previous = lead.transition_to(status)?;
        tx.save_lead(&lead).await?;
        tx.append_event(DomainEventRecord::new(
            lead.org_id,
            lead.id.0,
            EventType::StatusChange,
            json!({ "from": previous, "to": status }),
        ))
        .await?;
        tx.commit().await?;

        info!(lead_id = %lead.id, from = %previous, to = %status, "Lead status changed");
        record_operation("lead_status");

        self.dispatcher
            .dispatch(Self::status_effects(&lead, previous, status))
            .await;
        Ok(lead)
    }

    async fn delete(&self, lead_id: LeadId) -> Result<Lead, LifecycleError> {
        self.update_status(lead_id, LeadStatus::Dead).await
    }

    async fn purge(&self, lead_id: LeadId) -> Result<(), LifecycleError> {
        let mut tx = self.gateway.begin().await?;
        let lead = Self::load(&mut tx, lead_id).await?;

        if let Some(deal) = tx.find_in_progress_deal(lead_id).await? {
            return Err(LifecycleError::InvalidState(format!(
                "lead {} has in-progress deal {} and cannot be purged",
                lead_id, deal.id
            )));
        }

        tx.delete_lead(lead_id).await?;
        tx.append_event(DomainEventRecord::new(
            lead.org_id,
            lead.id.0,
            EventType::LeadPurged,
            json!({
                "fingerprint": lead.fingerprint,
                "status": lead.status,
            }),
        ))
        .await?;
        tx.commit().await?;

        info!(lead_id = %lead_id, org_id = %lead.org_id, "Lead purged");
        record_operation("lead_purge");

        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(lead.org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::LeadPurged { lead_id }),
            )
            .await;
        Ok(())
    }

    async fn get(&self, lead_id: LeadId) -> Result<Lead, LifecycleError> {
        self.gateway
            .find_lead(lead_id)
            .await?
            .ok_or_else(|| LifecycleError::lead_not_found(lead_id))
    }

    async fn list(&self, org_id: OrgId) -> Result<Vec<Lead>, LifecycleError> {
        Ok(self.gateway.list_leads(org_id).await?)
    }

    async fn deal_readiness(&self, lead_id: LeadId) -> Result<DealReadiness, LifecycleError> {
        Ok(self.get(lead_id).await?.deal_readiness())
    }

    async fn sweep_stale_leads(&self, org_id: OrgId, now: DateTime<Utc>) -> Result<StaleSweepReport, LifecycleError> {
        let mut report = StaleSweepReport::default();

        for lead in self.gateway.list_leads(org_id).await? {
            if lead.status.is_inactive() {
                continue;
            }
            let last_event = self
                .gateway
                .list_events(lead.id.0)
                .await?
                .into_iter()
                .filter(|e| !e.event_type.is_automation_output())
                .map(|e| e.occurred_at)
                .max();
            let last_activity = last_event.map_or(lead.updated_at, |at| at.max(lead.updated_at));
            let idle_days = (now - last_activity).num_days();

            let ctx = TriggerContext::new(org_id, UserId::system(), TriggerEvent::LeadStale { lead, idle_days });
            let outcome = self
                .dispatcher
                .dispatch(PostCommitEffects::for_org(org_id).automation(ctx))
                .await;

            report.leads_scanned += 1;
            for run in outcome.automation {
                report.rules_executed += run.executed.len();
                report.rule_failures += run.failed.len();
            }
        }

        info!(
            org_id = %org_id,
            scanned = report.leads_scanned,
            executed = report.rules_executed,
            "Stale lead sweep finished"
        );
        Ok(report)
    }
}
