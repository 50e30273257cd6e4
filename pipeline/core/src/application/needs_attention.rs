// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Needs-Attention Aggregator
//!
//! Read-only scan over an organization's deals. Each deal's events, issues and
//! metadata are read without a transaction and handed to the pure evaluator
//! in `domain::attention`; different deals may therefore be observed at
//! slightly different points in time. Signals are advisory and never stored.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

use crate::domain::attention::{evaluate_deal, AttentionSignal, DealSnapshot};
use crate::domain::deal::Deal;
use crate::domain::engine_config::AttentionThresholds;
use crate::domain::errors::LifecycleError;
use crate::domain::identity::OrgId;
use crate::domain::repository::PersistenceGateway;

pub struct NeedsAttentionAggregator {
    gateway: Arc<dyn PersistenceGateway>,
    thresholds: AttentionThresholds,
}

impl NeedsAttentionAggregator {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, thresholds: AttentionThresholds) -> Self {
        Self { gateway, thresholds }
    }

    pub async fn scan(&self, org_id: OrgId) -> Result<Vec<AttentionSignal>, LifecycleError> {
        self.scan_at(org_id, Utc::now()).await
    }

    /// Scan as of `now`, in deal creation order
    pub async fn scan_at(&self, org_id: OrgId, now: DateTime<Utc>) -> Result<Vec<AttentionSignal>, LifecycleError> {
        let deals = self.gateway.list_deals(org_id).await?;
        let per_deal = try_join_all(deals.iter().map(|deal| self.evaluate(deal, now))).await?;

        let signals: Vec<AttentionSignal> = per_deal.into_iter().flatten().collect();
        for signal in &signals {
            metrics::counter!("dealflow_attention_signals_total", "signal" => signal.signal.as_str())
                .increment(1);
        }
        debug!(org_id = %org_id, deals = deals.len(), signals = signals.len(), "Needs-attention scan complete");
        Ok(signals)
    }

    async fn evaluate(&self, deal: &Deal, now: DateTime<Utc>) -> Result<Vec<AttentionSignal>, LifecycleError> {
        let (events, issues, metadata) = futures::try_join!(
            self.gateway.list_events(deal.id.0),
            self.gateway.list_issues(deal.id),
            self.gateway.find_metadata(deal.id),
        )?;
        let snapshot = DealSnapshot {
            deal,
            events: &events,
            issues: &issues,
            metadata: &metadata,
        };
        Ok(evaluate_deal(snapshot, &self.thresholds, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attention::SignalType;
    use crate::domain::deal::{DealType, NewDeal};
    use crate::domain::identity::UserId;
    use crate::domain::issue::{DealIssue, IssueSeverity, NewIssueInput};
    use crate::domain::lead::LeadId;
    use crate::infrastructure::repositories::InMemoryPersistenceGateway;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_scan_reads_each_deal() {
        let gateway = InMemoryPersistenceGateway::new();
        let org = OrgId::new();
        let deal = Deal::open(NewDeal {
            org_id: org,
            lead_id: LeadId::new(),
            created_by: UserId::new(),
            deal_type: DealType::Assignment,
            buyer_name: None,
            assignment_fee: dec!(10000),
        });
        let issue = DealIssue::record(
            deal.id,
            NewIssueInput {
                title: "Lien on title".to_string(),
                severity: IssueSeverity::Blocking,
                discovered_at: None,
            },
        )
        .unwrap();

        let mut tx = gateway.begin().await.unwrap();
        tx.save_deal(&deal).await.unwrap();
        tx.save_issue(&issue).await.unwrap();
        tx.commit().await.unwrap();

        let aggregator = NeedsAttentionAggregator::new(Arc::new(gateway), AttentionThresholds::default());
        let signals = aggregator.scan_at(org, Utc::now() + Duration::days(30)).await.unwrap();
        let kinds: Vec<SignalType> = signals.iter().map(|s| s.signal).collect();
        assert!(kinds.contains(&SignalType::NoActivity));
        assert!(kinds.contains(&SignalType::StageUnchanged));
        assert!(kinds.contains(&SignalType::OpenBlockingIssues));

        assert!(aggregator.scan(OrgId::new()).await.unwrap().is_empty());
    }
}
