// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Post-commit collaborator contracts. Implementations must not block on
//! network delivery; a failure is reported as [`SinkError`] and the caller
//! logs it.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::deal::DealMetrics;
use crate::domain::events::{DomainEventRecord, Notification, RealtimeEvent};
use crate::domain::identity::OrgId;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{sink} channel is full")]
    Full { sink: &'static str },

    #[error("{sink} channel is closed")]
    Closed { sink: &'static str },

    #[error("{sink} unavailable: {reason}")]
    Unavailable { sink: &'static str, reason: String },
}

/// Read-through cache of per-organization aggregate views
#[async_trait]
pub trait AggregateCache: Send + Sync {
    /// Drop every cached view for the organization
    async fn invalidate(&self, org_id: OrgId) -> Result<(), SinkError>;

    /// Counter bumped by every `invalidate` for the organization
    async fn generation(&self, org_id: OrgId) -> u64;

    async fn get_metrics(&self, org_id: OrgId) -> Option<DealMetrics>;

    /// Store metrics computed after reading `generation`. Returns false and
    /// stores nothing if the org was invalidated in between.
    async fn put_metrics(&self, org_id: OrgId, generation: u64, metrics: DealMetrics) -> bool;
}

pub trait RealtimeSink: Send + Sync {
    fn broadcast(&self, org_id: OrgId, event: RealtimeEvent) -> Result<(), SinkError>;
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), SinkError>;
}

/// Asynchronous, batched append to the domain event log
pub trait EventQueue: Send + Sync {
    fn enqueue(&self, record: DomainEventRecord) -> Result<(), SinkError>;
}
