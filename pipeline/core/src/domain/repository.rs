// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Persistence Gateway Interfaces
//!
//! Storage contracts for the lifecycle engine, defined in the domain layer and
//! implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Purpose | Implementations |
//! |-------|---------|-----------------|
//! | `PersistenceGateway` | point reads, list queries, event log appends, `begin()` | `InMemoryPersistenceGateway` |
//! | `Transaction` | read-validate-write unit of one lifecycle operation | `InMemoryTransaction` |
//!
//! ## Transaction contract
//!
//! Every lifecycle mutation runs inside exactly one [`Transaction`]. Writes are
//! invisible to other readers until [`Transaction::commit`]; dropping a
//! transaction without committing discards them. Implementations must provide
//! at least read-committed isolation with conflict detection on the
//! uniqueness checks (lead fingerprint per org, one `in_progress` deal per lead):
//! of two racing transactions performing the same check, at most one may
//! commit a conflicting write.
//!
//! Gateway-level reads must not be issued while the same task holds an open
//! transaction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::deal::{Deal, DealId};
use crate::domain::events::DomainEventRecord;
use crate::domain::identity::OrgId;
use crate::domain::issue::{DealIssue, IssueId};
use crate::domain::lead::{Lead, LeadId};
use crate::domain::metadata::DealMetadata;

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> Result<Box<dyn Transaction>, RepositoryError>;

    async fn find_lead(&self, id: LeadId) -> Result<Option<Lead>, RepositoryError>;

    async fn list_leads(&self, org_id: OrgId) -> Result<Vec<Lead>, RepositoryError>;

    async fn find_deal(&self, id: DealId) -> Result<Option<Deal>, RepositoryError>;

    async fn list_deals(&self, org_id: OrgId) -> Result<Vec<Deal>, RepositoryError>;

    async fn find_metadata(&self, deal_id: DealId) -> Result<DealMetadata, RepositoryError>;

    async fn list_issues(&self, deal_id: DealId) -> Result<Vec<DealIssue>, RepositoryError>;

    /// Events for a lead or deal, oldest first
    async fn list_events(&self, subject_id: Uuid) -> Result<Vec<DomainEventRecord>, RepositoryError>;

    /// Append outside any transaction (asynchronous event-log path)
    async fn append_events(&self, events: Vec<DomainEventRecord>) -> Result<(), RepositoryError>;
}

/// One atomic unit of work
#[async_trait]
pub trait Transaction: Send {
    async fn find_lead(&mut self, id: LeadId) -> Result<Option<Lead>, RepositoryError>;

    async fn find_lead_by_fingerprint(
        &mut self,
        org_id: OrgId,
        fingerprint: &str,
    ) -> Result<Option<Lead>, RepositoryError>;

    /// Insert or replace
    async fn save_lead(&mut self, lead: &Lead) -> Result<(), RepositoryError>;

    /// Hard delete; irreversible once committed
    async fn delete_lead(&mut self, id: LeadId) -> Result<(), RepositoryError>;

    async fn find_deal(&mut self, id: DealId) -> Result<Option<Deal>, RepositoryError>;

    async fn find_in_progress_deal(&mut self, lead_id: LeadId) -> Result<Option<Deal>, RepositoryError>;

    async fn save_deal(&mut self, deal: &Deal) -> Result<(), RepositoryError>;

    async fn find_metadata(&mut self, deal_id: DealId) -> Result<DealMetadata, RepositoryError>;

    async fn save_metadata(&mut self, deal_id: DealId, metadata: &DealMetadata) -> Result<(), RepositoryError>;

    async fn find_issue(&mut self, id: IssueId) -> Result<Option<DealIssue>, RepositoryError>;

    async fn save_issue(&mut self, issue: &DealIssue) -> Result<(), RepositoryError>;

    async fn append_event(&mut self, event: DomainEventRecord) -> Result<(), RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    /// Explicit discard; dropping has the same effect
    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for RepositoryError {
    fn from(err: serde_yaml::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
