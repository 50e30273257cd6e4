// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Deal Aggregate
//!
//! A deal is one transaction instance tied to exactly one lead. Its `status`
//! leaves `in_progress` exactly once (to `closed` or `cancelled`) and never
//! returns. The legal `stage` lives on the same record but belongs to the
//! legal-stage state machine, and may still move after the status is final.
//!
//! The "at most one `in_progress` deal per lead" invariant spans aggregates and
//! is enforced by the deal lifecycle transaction, not here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::LifecycleError;
use crate::domain::identity::{OrgId, UserId};
use crate::domain::lead::LeadId;
use crate::domain::legal_stage::LegalStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealId(pub Uuid);

impl DealId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for DealId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DealId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    InProgress,
    Closed,
    Cancelled,
}

impl DealStatus {
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealType {
    Assignment,
    DoubleClose,
    Novation,
}

impl Default for DealType {
    fn default() -> Self {
        Self::Assignment
    }
}

/// Caller-supplied deal creation input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDealInput {
    pub lead_id: LeadId,
    #[serde(default)]
    pub buyer_name: Option<String>,
    #[serde(default)]
    pub assignment_fee: Option<Decimal>,
    #[serde(default)]
    pub deal_type: DealType,
}

/// Fully resolved fields for [`Deal::open`]
#[derive(Debug, Clone)]
pub struct NewDeal {
    pub org_id: OrgId,
    pub lead_id: LeadId,
    pub created_by: UserId,
    pub deal_type: DealType,
    pub buyer_name: Option<String>,
    pub assignment_fee: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseDealInput {
    #[serde(default)]
    pub profit: Option<Decimal>,
    #[serde(default)]
    pub close_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub org_id: OrgId,
    pub lead_id: LeadId,
    pub created_by: UserId,
    pub deal_type: DealType,
    pub buyer_name: Option<String>,
    pub assignment_fee: Decimal,
    pub profit: Decimal,
    pub status: DealStatus,
    pub stage: LegalStage,
    pub close_date: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// New `in_progress` deal at `PRE_CONTRACT`; profit starts equal to the fee
    pub fn open(new: NewDeal) -> Self {
        let now = Utc::now();
        Self {
            id: DealId::new(),
            org_id: new.org_id,
            lead_id: new.lead_id,
            created_by: new.created_by,
            deal_type: new.deal_type,
            buyer_name: new.buyer_name,
            assignment_fee: new.assignment_fee,
            profit: new.assignment_fee,
            status: DealStatus::InProgress,
            stage: LegalStage::PreContract,
            close_date: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn close(&mut self, input: CloseDealInput) -> Result<(), LifecycleError> {
        self.ensure_in_progress("close")?;
        let now = Utc::now();
        self.status = DealStatus::Closed;
        self.close_date = Some(input.close_date.unwrap_or(now));
        if let Some(profit) = input.profit {
            self.profit = profit;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<String>) -> Result<(), LifecycleError> {
        self.ensure_in_progress("cancel")?;
        self.status = DealStatus::Cancelled;
        self.cancellation_reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_stage(&mut self, stage: LegalStage) {
        self.stage = stage;
        self.updated_at = Utc::now();
    }

    fn ensure_in_progress(&self, operation: &str) -> Result<(), LifecycleError> {
        if self.status.is_final() {
            return Err(LifecycleError::InvalidState(format!(
                "cannot {} deal {}: already {}",
                operation, self.id, self.status
            )));
        }
        Ok(())
    }
}

/// Aggregate deal figures for one organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealMetrics {
    pub total: usize,
    pub in_progress: usize,
    pub closed: usize,
    pub cancelled: usize,
    /// Sum of profit over closed deals
    pub total_profit: Decimal,
    /// Sum of assignment fees over closed deals
    pub total_assignment_fees: Decimal,
    /// Average profit over closed deals (zero when none closed)
    pub average_profit: Decimal,
    /// closed / total as a percentage (zero when there are no deals)
    pub close_rate: Decimal,
}

impl DealMetrics {
    pub fn compute(deals: &[Deal]) -> Self {
        let mut metrics = Self {
            total: deals.len(),
            in_progress: 0,
            closed: 0,
            cancelled: 0,
            total_profit: Decimal::ZERO,
            total_assignment_fees: Decimal::ZERO,
            average_profit: Decimal::ZERO,
            close_rate: Decimal::ZERO,
        };

        for deal in deals {
            match deal.status {
                DealStatus::InProgress => metrics.in_progress += 1,
                DealStatus::Cancelled => metrics.cancelled += 1,
                DealStatus::Closed => {
                    metrics.closed += 1;
                    metrics.total_profit += deal.profit;
                    metrics.total_assignment_fees += deal.assignment_fee;
                }
            }
        }

        if metrics.closed > 0 {
            metrics.average_profit = metrics.total_profit / Decimal::from(metrics.closed);
        }
        if metrics.total > 0 {
            metrics.close_rate = (Decimal::from(metrics.closed) * Decimal::ONE_HUNDRED
                / Decimal::from(metrics.total))
            .round_dp(2);
        }
        metrics
    }
}
