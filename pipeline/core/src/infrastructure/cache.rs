// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process aggregate cache keyed by organization. Invalidation drops the
//! cached views for the org and bumps its generation; a put computed against
//! an older generation is discarded.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::deal::DealMetrics;
use crate::domain::identity::OrgId;
use crate::domain::side_effects::{AggregateCache, SinkError};

#[derive(Debug, Clone, Default)]
struct OrgAggregates {
    generation: u64,
    metrics: Option<DealMetrics>,
}

#[derive(Clone, Default)]
pub struct InMemoryAggregateCache {
    entries: Arc<DashMap<OrgId, OrgAggregates>>,
}

impl InMemoryAggregateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cached(&self, org_id: OrgId) -> bool {
        self.entries
            .get(&org_id)
            .is_some_and(|entry| entry.metrics.is_some())
    }
}

#[async_trait]
impl AggregateCache for InMemoryAggregateCache {
    async fn invalidate(&self, org_id: OrgId) -> Result<(), SinkError> {
        let mut entry = self.entries.entry(org_id).or_default();
        entry.generation += 1;
        if entry.metrics.take().is_some() {
            debug!(org_id = %org_id, generation = entry.generation, "Invalidated cached aggregates");
        }
        Ok(())
    }

    async fn generation(&self, org_id: OrgId) -> u64 {
        self.entries.get(&org_id).map_or(0, |entry| entry.generation)
    }

    async fn get_metrics(&self, org_id: OrgId) -> Option<DealMetrics> {
        self.entries.get(&org_id).and_then(|entry| entry.metrics.clone())
    }

    async fn put_metrics(&self, org_id: OrgId, generation: u64, metrics: DealMetrics) -> bool {
        let mut entry = self.entries.entry(org_id).or_default();
        if entry.generation != generation {
            return false;
        }
        entry.metrics = Some(metrics);
        true
    }
}
