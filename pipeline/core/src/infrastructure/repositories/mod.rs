// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the persistence gateway defined in the
//! domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve leads, deals, metadata, issues and events
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **InMemoryPersistenceGateway** - Mutex-guarded store with real
//!   transactions, used for development, tests and CLI snapshot analysis
//!
//! # Isolation
//!
//! A transaction holds the store lock from `begin()` until commit or drop and
//! works on a private copy of the entity tables. That serializes lifecycle
//! transactions, so uniqueness checks (fingerprint, in-progress deal) cannot
//! race. Commit swaps the copy in; dropping the transaction discards it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::domain::deal::{Deal, DealId, DealStatus};
use crate::domain::events::DomainEventRecord;
use crate::domain::identity::OrgId;
use crate::domain::issue::{DealIssue, IssueId};
use crate::domain::lead::{Lead, LeadId};
use crate::domain::metadata::DealMetadata;
use crate::domain::repository::{PersistenceGateway, RepositoryError, Transaction};

#[derive(Debug, Clone, Default)]
struct Tables {
    leads: HashMap<LeadId, Lead>,
    deals: HashMap<DealId, Deal>,
    metadata: HashMap<DealId, DealMetadata>,
    issues: HashMap<IssueId, DealIssue>,
}

#[derive(Debug, Default)]
struct Store {
    tables: Tables,
    events: Vec<DomainEventRecord>,
}

#[derive(Clone, Default)]
pub struct InMemoryPersistenceGateway {
    store: Arc<Mutex<Store>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryPersistenceGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail without applying its writes
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of committed event log entries
    pub async fn event_count(&self) -> usize {
        self.store.lock().await.events.len()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryPersistenceGateway {
    async fn begin(&self) -> Result<Box<dyn Transaction>, RepositoryError> {
        let guard = self.store.clone().lock_owned().await;
        let working = guard.tables.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            pending_events: Vec::new(),
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }

    async fn find_lead(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store.tables.leads.get(&id).cloned())
    }

    async fn list_leads(&self, org_id: OrgId) -> Result<Vec<Lead>, RepositoryError> {
        let store = self.store.lock().await;
        let mut leads: Vec<Lead> = store
            .tables
            .leads
            .values()
            .filter(|l| l.org_id == org_id)
            .cloned()
            .collect();
        leads.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(leads)
    }

    async fn find_deal(&self, id: DealId) -> Result<Option<Deal>, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store.tables.deals.get(&id).cloned())
    }

    async fn list_deals(&self, org_id: OrgId) -> Result<Vec<Deal>, RepositoryError> {
        let store = self.store.lock().await;
        let mut deals: Vec<Deal> = store
            .tables
            .deals
            .values()
            .filter(|d| d.org_id == org_id)
            .cloned()
            .collect();
        deals.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(deals)
    }

    async fn find_metadata(&self, deal_id: DealId) -> Result<DealMetadata, RepositoryError> {
        let store = self.store.lock().await;
        Ok(store.tables.metadata.get(&deal_id).cloned().unwrap_or_default())
    }

    async fn list_issues(&self, deal_id: DealId) -> Result<Vec<DealIssue>, RepositoryError> {
        let store = self.store.lock().await;
        let mut issues: Vec<DealIssue> = store
            .tables
            .issues
            .values()
            .filter(|i| i.deal_id == deal_id)
            .cloned()
            .collect();
        issues.sort_by(|a, b| a.discovered_at.cmp(&b.discovered_at));
        Ok(issues)
    }

    async fn list_events(&self, subject_id: Uuid) -> Result<Vec<DomainEventRecord>, RepositoryError> {
        let store = self.store.lock().await;
        let mut events: Vec<DomainEventRecord> = store
            .events
            .iter()
            .filter(|e| e.subject_id == subject_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        Ok(events)
    }

    async fn append_events(&self, events: Vec<DomainEventRecord>) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().await;
        debug!(count = events.len(), "Appending events to log");
        store.events.extend(events);
        Ok(())
    }
}

pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Store>,
    working: Tables,
    pending_events: Vec<DomainEventRecord>,
    fail_commit: bool,
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn find_lead(&mut self, id: LeadId) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.working.leads.get(&id).cloned())
    }

    async fn find_lead_by_fingerprint(
        &mut self,
        org_id: OrgId,
        fingerprint: &str,
    ) -> Result<Option<Lead>, RepositoryError> {
        Ok(self
            .working
            .leads
            .values()
            .find(|l| l.org_id == org_id && l.fingerprint == fingerprint)
            .cloned())
    }

    async fn save_lead(&mut self, lead: &Lead) -> Result<(), RepositoryError> {
        self.working.leads.insert(lead.id, lead.clone());
        Ok(())
    }

    async fn delete_lead(&mut self, id: LeadId) -> Result<(), RepositoryError> {
        self.working
            .leads
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("lead {}", id)))
    }

    async fn find_deal(&mut self, id: DealId) -> Result<Option<Deal>, RepositoryError> {
        Ok(self.working.deals.get(&id).cloned())
    }

    async fn find_in_progress_deal(&mut self, lead_id: LeadId) -> Result<Option<Deal>, RepositoryError> {
        Ok(self
            .working
            .deals
            .values()
            .find(|d| d.lead_id == lead_id && d.status == DealStatus::InProgress)
            .cloned())
    }

    async fn save_deal(&mut self, deal: &Deal) -> Result<(), RepositoryError> {
        self.working.deals.insert(deal.id, deal.clone());
        Ok(())
    }

    async fn find_metadata(&mut self, deal_id: DealId) -> Result<DealMetadata, RepositoryError> {
        Ok(self.working.metadata.get(&deal_id).cloned().unwrap_or_default())
    }

    async fn save_metadata(&mut self, deal_id: DealId, metadata: &DealMetadata) -> Result<(), RepositoryError> {
        self.working.metadata.insert(deal_id, metadata.clone());
        Ok(())
    }

    async fn find_issue(&mut self, id: IssueId) -> Result<Option<DealIssue>, RepositoryError> {
        Ok(self.working.issues.get(&id).cloned())
    }

    async fn save_issue(&mut self, issue: &DealIssue) -> Result<(), RepositoryError> {
        self.working.issues.insert(issue.id, issue.clone());
        Ok(())
    }

    async fn append_event(&mut self, event: DomainEventRecord) -> Result<(), RepositoryError> {
        self.pending_events.push(event);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let InMemoryTransaction {
            mut guard,
            working,
            pending_events,
            fail_commit,
        } = *self;
        if fail_commit {
            return Err(RepositoryError::Database("commit rejected by store".to_string()));
        }
        guard.tables = working;
        guard.events.extend(pending_events);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine_config::UnderwritingConfig;
    use crate::domain::events::EventType;
    use crate::domain::identity::UserId;
    use crate::domain::lead::LeadInput;

    fn lead(org_id: OrgId) -> Lead {
        Lead::create(
            org_id,
            UserId::new(),
            LeadInput {
                street: "12 Elm St".to_string(),
                city: "Dayton".to_string(),
                state: "OH".to_string(),
                zip: "45402".to_string(),
                ..LeadInput::default()
            },
            &UnderwritingConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let gateway = InMemoryPersistenceGateway::new();
        let org = OrgId::new();
        let lead = lead(org);

        let mut tx = gateway.begin().await.unwrap();
        tx.save_lead(&lead).await.unwrap();
        tx.append_event(DomainEventRecord::new(
            org,
            lead.id.0,
            EventType::LeadCreated,
            serde_json::Value::Null,
        ))
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert!(gateway.find_lead(lead.id).await.unwrap().is_some());
        assert_eq!(gateway.list_events(lead.id.0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let gateway = InMemoryPersistenceGateway::new();
        let lead = lead(OrgId::new());
        {
            let mut tx = gateway.begin().await.unwrap();
            tx.save_lead(&lead).await.unwrap();
        }
        assert!(gateway.find_lead(lead.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let gateway = InMemoryPersistenceGateway::new();
        let lead = lead(OrgId::new());
        gateway.set_fail_commits(true);

        let mut tx = gateway.begin().await.unwrap();
        tx.save_lead(&lead).await.unwrap();
        assert!(tx.commit().await.is_err());
        assert!(gateway.find_lead(lead.id).await.unwrap().is_none());
        assert_eq!(gateway.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_fingerprint_lookup_is_org_scoped() {
        let gateway = InMemoryPersistenceGateway::new();
        let org = OrgId::new();
        let lead = lead(org);
        let mut tx = gateway.begin().await.unwrap();
        tx.save_lead(&lead).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = gateway.begin().await.unwrap();
        assert!(tx.find_lead_by_fingerprint(org, &lead.fingerprint).await.unwrap().is_some());
        assert!(tx
            .find_lead_by_fingerprint(OrgId::new(), &lead.fingerprint)
            .await
            .unwrap()
            .is_none());
    }
}
