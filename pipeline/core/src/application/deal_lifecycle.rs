// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Deal Lifecycle Use Cases
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Create, close and cancel deals together with their parent lead
//! - **Collaborators:**
//!   - Domain: Deal and Lead aggregates, DealMetrics
//!   - Infrastructure: PersistenceGateway, AggregateCache, EffectDispatcher
//!
//! # Transaction Boundary
//!
//! Each write operation spans two aggregates. The deal write, the forced lead
//! status and both domain events are one transaction:
//!
//! | Operation | Deal status | Lead status | Events |
//! |-----------|-------------|-------------|--------|
//! | create | `in_progress` | `under_contract` | `deal_created`, `status_change` |
//! | close | `closed` | `closed` | `deal_closed`, `status_change` |
//! | cancel | `cancelled` | `qualified` | `deal_cancelled`, `status_change` |
//!
//! The "one in-progress deal per lead" check runs inside the same
//! transaction as the insert, so of two concurrent creates for one lead
//! exactly one commits and the other sees it and fails with `DuplicateDeal`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::post_commit::{EffectDispatcher, PostCommitEffects};
use crate::application::record_operation;
use crate::domain::automation::{TriggerContext, TriggerEvent};
use crate::domain::deal::{CloseDealInput, CreateDealInput, Deal, DealId, DealMetrics, NewDeal};
use crate::domain::errors::{EntityKind, LifecycleError};
use crate::domain::events::{
    DomainEventRecord, EventType, Notification, NotificationCategory, RealtimeEvent,
};
use crate::domain::identity::{OrgId, UserId};
use crate::domain::lead::{Lead, LeadStatus};
use crate::domain::repository::{PersistenceGateway, Transaction};

#[async_trait]
pub trait DealLifecycleService: Send + Sync {
    /// Open a deal for a lead and force the lead to `under_contract`
    ///
    /// # Errors
    ///
    /// - `NotFound` if the lead does not exist
    /// - `Forbidden` if the lead belongs to another organization
    /// - `InvalidState` if the lead is `dead` or `closed`
    /// - `DuplicateDeal` if the lead already has an in-progress deal
    async fn create(&self, org_id: OrgId, user_id: UserId, input: CreateDealInput) -> Result<Deal, LifecycleError>;

    /// Close an in-progress deal and its lead
    async fn close(&self, deal_id: DealId, input: CloseDealInput) -> Result<Deal, LifecycleError>;

    /// Cancel an in-progress deal; the lead goes back to `qualified`
    async fn cancel(&self, deal_id: DealId, reason: Option<String>) -> Result<Deal, LifecycleError>;

    async fn get(&self, deal_id: DealId) -> Result<Deal, LifecycleError>;

    async fn list_for_org(&self, org_id: OrgId) -> Result<Vec<Deal>, LifecycleError>;

    /// Status counts and profit figures for the org, read through the cache
    async fn get_metrics(&self, org_id: OrgId) -> Result<DealMetrics, LifecycleError>;
}

pub struct StandardDealLifecycleService {
    gateway: Arc<dyn PersistenceGateway>,
    dispatcher: Arc<EffectDispatcher>,
}

impl StandardDealLifecycleService {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, dispatcher: Arc<EffectDispatcher>) -> Self {
        Self { gateway, dispatcher }
    }

    async fn load_deal(tx: &mut Box<dyn Transaction>, deal_id: DealId) -> Result<Deal, LifecycleError> {
        tx.find_deal(deal_id)
            .await?
            .ok_or_else(|| LifecycleError::deal_not_found(deal_id))
    }

    /// Parent lead of an existing deal. A deal whose lead vanished means the
    /// store is inconsistent, not that the caller asked for a missing lead.
    async fn load_parent(tx: &mut Box<dyn Transaction>, deal: &Deal) -> Result<Lead, LifecycleError> {
        tx.find_lead(deal.lead_id).await?.ok_or_else(|| {
            LifecycleError::InvalidState(format!("deal {} references missing lead {}", deal.id, deal.lead_id))
        })
    }

    /// Force the parent lead's status and record it with the same transaction
    async fn force_lead_status(
        tx: &mut Box<dyn Transaction>,
        lead: &mut Lead,
        target: LeadStatus,
        deal_id: DealId,
    ) -> Result<LeadStatus, LifecycleError> {
        let previous = lead.force_status(target);
        tx.save_lead(lead).await?;
        tx.append_event(DomainEventRecord::new(
            lead.org_id,
            lead.id.0,
            EventType::StatusChange,
            json!({ "from": previous, "to": target, "deal_id": deal_id }),
        ))
        .await?;
        Ok(previous)
    }
}

#[async_trait]
impl DealLifecycleService for StandardDealLifecycleService {
    async fn create(&self, org_id: OrgId, user_id: UserId, input: CreateDealInput) -> Result<Deal, LifecycleError> {
        if let Some(fee) = input.assignment_fee {
            if fee < Decimal::ZERO {
                return Err(LifecycleError::validation("assignment_fee", "must not be negative"));
            }
        }

        let mut tx = self.gateway.begin().await?;

        // Step 1: Lead must exist, be ours and still be active
        let mut lead = tx
            .find_lead(input.lead_id)
            .await?
            .ok_or_else(|| LifecycleError::lead_not_found(input.lead_id))?;
        if lead.org_id != org_id {
            return Err(LifecycleError::Forbidden {
                entity: EntityKind::Lead,
                id: lead.id.0,
            });
        }
        if lead.status.is_inactive() {
            return Err(LifecycleError::InvalidState(format!(
                "lead {} is {} and cannot start a deal",
                lead.id, lead.status
            )));
        }

        // Step 2: Uniqueness of the in-progress deal
        if let Some(existing) = tx.find_in_progress_deal(lead.id).await? {
            debug!(lead_id = %lead.id, existing_id = %existing.id, "Duplicate deal rejected");
            return Err(LifecycleError::DuplicateDeal { existing_id: existing.id });
        }

        // Step 3: Deal, forced lead status and events
        let deal = Deal::open(NewDeal {
            org_id,
            lead_id: lead.id,
            created_by: user_id,
            deal_type: input.deal_type,
            buyer_name: input.buyer_name.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()),
            assignment_fee: input.assignment_fee.unwrap_or(lead.underwriting.desired_fee),
        });
        tx.save_deal(&deal).await?;
        tx.append_event(DomainEventRecord::new(
            org_id,
            deal.id.0,
            EventType::DealCreated,
            json!({
                "actor": user_id,
                "lead_id": lead.id,
                "deal_type": deal.deal_type,
                "assignment_fee": deal.assignment_fee,
            }),
        ))
        .await?;
        let previous = Self::force_lead_status(&mut tx, &mut lead, LeadStatus::UnderContract, deal.id).await?;
        tx.commit().await?;

        info!(deal_id = %deal.id, lead_id = %lead.id, org_id = %org_id, "Deal created");
        record_operation("deal_create");

        // Step 4: Post-commit effects
        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::DealCreated {
                        deal_id: deal.id,
                        lead_id: lead.id,
                    })
                    .broadcast(RealtimeEvent::LeadStatusChanged {
                        lead_id: lead.id,
                        from: previous,
                        to: LeadStatus::UnderContract,
                    })
                    .automation(TriggerContext::new(
                        org_id,
                        user_id,
                        TriggerEvent::DealCreated {
                            deal: deal.clone(),
                            lead,
                        },
                    )),
            )
            .await;
        Ok(deal)
    }

    async fn close(&self, deal_id: DealId, input: CloseDealInput) -> Result<Deal, LifecycleError> {
        let mut tx = self.gateway.begin().await?;
        let mut deal = Self::load_deal(&mut tx, deal_id).await?;
        deal.close(input)?;
        let mut lead = Self::load_parent(&mut tx, &deal).await?;

        tx.save_deal(&deal).await?;
        tx.append_event(DomainEventRecord::new(
            deal.org_id,
            deal.id.0,
            EventType::DealClosed,
            json!({ "profit": deal.profit, "close_date": deal.close_date }),
        ))
        .await?;
        let previous = Self::force_lead_status(&mut tx, &mut lead, LeadStatus::Closed, deal.id).await?;
        tx.commit().await?;

        info!(deal_id = %deal.id, lead_id = %lead.id, profit = %deal.profit, "Deal closed");
        record_operation("deal_close");

        let notification = Notification {
            org_id: deal.org_id,
            category: NotificationCategory::DealClosed,
            message: format!("Deal closed for {} with {} profit", lead.address.street, deal.profit.round_dp(2)),
            metadata: json!({ "deal_id": deal.id, "lead_id": lead.id, "profit": deal.profit }),
        };
        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(deal.org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::DealClosed {
                        deal_id: deal.id,
                        profit: deal.profit,
                    })
                    .broadcast(RealtimeEvent::LeadStatusChanged {
                        lead_id: lead.id,
                        from: previous,
                        to: LeadStatus::Closed,
                    })
                    .notify(notification)
                    .automation(TriggerContext::new(
                        deal.org_id,
                        deal.created_by,
                        TriggerEvent::DealClosed { deal: deal.clone() },
                    )),
            )
            .await;
        Ok(deal)
    }

    async fn cancel(&self, deal_id: DealId, reason: Option<String>) -> Result<Deal, LifecycleError> {
        let mut tx = self.gateway.begin().await?;
        let mut deal = Self::load_deal(&mut tx, deal_id).await?;
        deal.cancel(reason)?;
        let mut lead = Self::load_parent(&mut tx, &deal).await?;

        tx.save_deal(&deal).await?;
        tx.append_event(DomainEventRecord::new(
            deal.org_id,
            deal.id.0,
            EventType::DealCancelled,
            json!({ "reason": deal.cancellation_reason }),
        ))
        .await?;
        // Always back to qualified, whatever the lead was before the deal
        let previous = Self::force_lead_status(&mut tx, &mut lead, LeadStatus::Qualified, deal.id).await?;
        tx.commit().await?;

        info!(deal_id = %deal.id, lead_id = %lead.id, "Deal cancelled");
        record_operation("deal_cancel");

        // No automation on cancel
        self.dispatcher
            .dispatch(
                PostCommitEffects::for_org(deal.org_id)
                    .invalidate_cache()
                    .broadcast(RealtimeEvent::DealCancelled { deal_id: deal.id })
                    .broadcast(RealtimeEvent::LeadStatusChanged {
                        lead_id: lead.id,
                        from: previous,
                        to: LeadStatus::Qualified,
                    }),
            )
            .await;
        Ok(deal)
    }

    async fn get(&self, deal_id: DealId) -> Result<Deal, LifecycleError> {
        self.gateway
            .find_deal(deal_id)
            .await?
            .ok_or_else(|| LifecycleError::deal_not_found(deal_id))
    }

    async fn list_for_org(&self, org_id: OrgId) -> Result<Vec<Deal>, LifecycleError> {
        Ok(self.gateway.list_deals(org_id).await?)
    }

    async fn get_metrics(&self, org_id: OrgId) -> Result<DealMetrics, LifecycleError> {
        let cache = self.dispatcher.cache();
        if let Some(metrics) = cache.get_metrics(org_id).await {
            debug!(org_id = %org_id, "Deal metrics served from cache");
            return Ok(metrics);
        }
        let generation = cache.generation(org_id).await;
        let deals = self.gateway.list_deals(org_id).await?;
        let metrics = DealMetrics::compute(&deals);
        if !cache.put_metrics(org_id, generation, metrics.clone()).await {
            debug!(org_id = %org_id, "Deal metrics changed while computing, not cached");
        }
        Ok(metrics)
    }
}
