// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Offline snapshots
//!
//! A snapshot is a JSON export of one or more organizations' leads, deals,
//! deal metadata, issues and event log. The CLI loads it into the in-memory
//! gateway in a single transaction and runs the engine's read paths over it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use dealflow_core::domain::deal::{Deal, DealId};
use dealflow_core::domain::events::DomainEventRecord;
use dealflow_core::domain::identity::OrgId;
use dealflow_core::domain::issue::DealIssue;
use dealflow_core::domain::lead::Lead;
use dealflow_core::domain::metadata::DealMetadata;
use dealflow_core::domain::repository::{PersistenceGateway, Transaction};
use dealflow_core::infrastructure::InMemoryPersistenceGateway;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealMetadataEntry {
    pub deal_id: DealId,
    #[serde(flatten)]
    pub metadata: DealMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub leads: Vec<Lead>,
    #[serde(default)]
    pub deals: Vec<Deal>,
    #[serde(default)]
    pub metadata: Vec<DealMetadataEntry>,
    #[serde(default)]
    pub issues: Vec<DealIssue>,
    #[serde(default)]
    pub events: Vec<DomainEventRecord>,
}

impl Snapshot {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read snapshot {:?}", path))?;
        Self::from_json_str(&content).with_context(|| format!("Failed to parse snapshot {:?}", path))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Organizations that own at least one deal, in id order
    pub fn deal_orgs(&self) -> Vec<OrgId> {
        self.deals
            .iter()
            .map(|d| d.org_id.0)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(OrgId)
            .collect()
    }

    /// Load everything into a fresh in-memory gateway
    ///
    /// Derived underwriting outputs are recomputed rather than trusted.
    pub async fn into_gateway(self) -> Result<InMemoryPersistenceGateway> {
        let gateway = InMemoryPersistenceGateway::new();
        let mut tx = gateway.begin().await?;

        for mut lead in self.leads {
            lead.recompute_underwriting();
            tx.save_lead(&lead).await?;
        }
        for deal in &self.deals {
            tx.save_deal(deal).await?;
        }
        for entry in &self.metadata {
            tx.save_metadata(entry.deal_id, &entry.metadata).await?;
        }
        for issue in &self.issues {
            tx.save_issue(issue).await?;
        }
        for event in self.events {
            tx.append_event(event).await?;
        }
        tx.commit().await.context("Failed to load snapshot into the in-memory store")?;

        Ok(gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealflow_core::domain::deal::{DealType, NewDeal};
    use dealflow_core::domain::engine_config::UnderwritingConfig;
    use dealflow_core::domain::identity::UserId;
    use dealflow_core::domain::lead::LeadInput;
    use rust_decimal_macros::dec;

    fn sample() -> (Lead, Deal) {
        let org_id = OrgId::new();
        let lead = Lead::create(
            org_id,
            UserId::new(),
            LeadInput {
                street: "1 Snapshot Way".to_string(),
                city: "Austin".to_string(),
                state: "TX".to_string(),
                zip: "78701".to_string(),
                arv: Some(dec!(300000)),
                estimated_repairs: Some(dec!(40000)),
                ..LeadInput::default()
            },
            &UnderwritingConfig::default(),
        )
        .unwrap();
        let deal = Deal::open(NewDeal {
            org_id,
            lead_id: lead.id,
            created_by: UserId::new(),
            deal_type: DealType::Assignment,
            buyer_name: None,
            assignment_fee: dec!(10000),
        });
        (lead, deal)
    }

    #[tokio::test]
    async fn test_snapshot_loads_into_gateway() {
        let (lead, deal) = sample();
        let snapshot = Snapshot {
            leads: vec![lead.clone()],
            deals: vec![deal.clone()],
            ..Snapshot::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();

        let parsed = Snapshot::from_json_str(&json).unwrap();
        assert_eq!(parsed.deal_orgs(), vec![deal.org_id]);

        let gateway = parsed.into_gateway().await.unwrap();
        let stored = gateway.find_lead(lead.id).await.unwrap().unwrap();
        assert_eq!(stored.max_offer_amount(), Some(dec!(160000)));
        assert_eq!(gateway.list_deals(deal.org_id).await.unwrap().len(), 1);
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let snapshot = Snapshot::from_json_str("{}").unwrap();
        assert!(snapshot.leads.is_empty());
        assert!(snapshot.deal_orgs().is_empty());
    }
}
