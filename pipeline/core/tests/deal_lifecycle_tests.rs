// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the deal lifecycle: the forced lead status on
//! create/close/cancel, the single in-progress deal per lead, transaction
//! atomicity and metrics cache invalidation.

mod common;

use dealflow_core::application::{DealLifecycleService, LeadLifecycleService, LifecycleEngine};
use async_trait::async_trait;
use dealflow_core::domain::deal::{CloseDealInput, CreateDealInput, DealMetrics, DealStatus, DealType};
use dealflow_core::domain::engine_config::EngineConfigSpec;
use dealflow_core::domain::errors::{ErrorKind, LifecycleError};
use dealflow_core::domain::events::{EventType, NotificationCategory};
use dealflow_core::domain::identity::{OrgId, UserId};
use dealflow_core::domain::lead::{LeadId, LeadStatus};
use dealflow_core::domain::repository::PersistenceGateway;
use dealflow_core::domain::side_effects::{AggregateCache, SinkError};
use dealflow_core::infrastructure::{InMemoryAggregateCache, InMemoryPersistenceGateway};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::Notify;

use common::{engine, lead_input, qualified_lead};

fn deal_input(lead_id: LeadId) -> CreateDealInput {
    CreateDealInput {
        lead_id,
        buyer_name: Some("  Acme Holdings ".to_string()),
        assignment_fee: None,
        deal_type: DealType::Assignment,
    }
}

fn closing(profit: rust_decimal::Decimal) -> CloseDealInput {
    CloseDealInput {
        profit: Some(profit),
        close_date: None,
    }
}

#[tokio::test]
async fn test_create_and_close_drive_lead_status() {
    let gateway = InMemoryPersistenceGateway::new();
    let (engine, mut channels) = engine(&gateway);
    let org = OrgId::new();
    let lead = qualified_lead(&engine, org, "12 Harbor Rd", "IL").await;

    let deal = engine.deals().create(org, UserId::new(), deal_input(lead.id)).await.unwrap();
    assert_eq!(deal.status, DealStatus::InProgress);
    assert_eq!(deal.assignment_fee, dec!(10000));
    assert_eq!(deal.buyer_name.as_deref(), Some("Acme Holdings"));
    assert_eq!(engine.leads().get(lead.id).await.unwrap().status, LeadStatus::UnderContract);

    let closed = engine.deals().close(deal.id, closing(dec!(12000))).await.unwrap();
    assert_eq!(closed.status, DealStatus::Closed);
    assert_eq!(closed.profit, dec!(12000));
    assert!(closed.close_date.is_some());
    assert_eq!(engine.leads().get(lead.id).await.unwrap().status, LeadStatus::Closed);

    let deal_events: Vec<_> = gateway
        .list_events(deal.id.0)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert!(deal_events.contains(&EventType::DealCreated));
    assert!(deal_events.contains(&EventType::DealClosed));

    // Automation notifications share the channel; look for the closing one
    let mut categories = Vec::new();
    while let Ok(notification) = channels.notifications.try_recv() {
        categories.push(notification.category);
    }
    assert!(categories.contains(&NotificationCategory::DealClosed));
}

#[tokio::test]
async fn test_explicit_fee_overrides_lead_fee() {
    let gateway = InMemoryPersistenceGateway::new();
    let (engine, _channels) = engine(&gateway);
    let org = OrgId::new();
    let lead = qualified_lead(&engine, org, "13 Harbor Rd", "IL").await;

    let mut input = deal_input(lead.id);
    input.assignment_fee = Some(dec!(7500));
    let deal = engine.deals().create(org, UserId::new(), input).await.unwrap();
    assert_eq!(deal.assignment_fee, dec!(7500));

    let mut negative = deal_input(lead.id);
    negative.assignment_fee = Some(dec!(-1));
    let err = engine.deals().create(org, UserId::new(), negative).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_final_deals_reject_close_and_cancel() {
    let gateway = InMemoryPersistenceGateway::new();
    let (engine, _channels) = engine(&gateway);
    let org = OrgId::new();
    let lead = qualified_lead(&engine, org, "14 Harbor Rd", "IL").await;
    let deal = engine.deals().create(org, UserId::new(), deal_input(lead.id)).await.unwrap();

    engine.deals().close(deal.id, CloseDealInput::default()).await.unwrap();

    let err = engine.deals().close(deal.id, CloseDealInput::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = engine.deals().cancel(deal.id, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_cancel_returns_lead_to_qualified() {
    let gateway = InMemoryPersistenceGateway::new();
    let (engine, _channels) = engine(&gateway);
    let org = OrgId::new();
    let lead = qualified_lead(&engine, org, "15 Harbor Rd", "IL").await;
    let deal = engine.deals().create(org, UserId::new(), deal_input(lead.id)).await.unwrap();

    let cancelled = engine
        .deals()
        .cancel(deal.id, Some(" buyer walked ".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, DealStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("buyer walked"));
    assert_eq!(engine.leads().get(lead.id).await.unwrap().status, LeadStatus::Qualified);

    // The lead may start a fresh deal afterwards
    assert!(engine.deals().create(org, UserId::new(), deal_input(lead.id)).await.is_ok());
}

#[tokio::test]
async fn test_create_checks_lead_ownership_and_state() {
    let gateway = InMemoryPersistenceGateway::new();
    let (engine, _channels) = engine(&gateway);
    let org = OrgId::new();

    let err = engine
        .deals()
        .create(org, UserId::new(), deal_input(LeadId::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let lead = qualified_lead(&engine, org, "16 Harbor Rd", "IL").await;
    let err = engine
        .deals()
        .create(OrgId::new(), UserId::new(), deal_input(lead.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let dead = engine
        .leads()
        .create(org, UserId::new(), lead_input("17 Harbor Rd", "IL"))
        .await
        .unwrap();
    engine.leads().delete(dead.id).await.unwrap();
    let err = engine.deals().create(org, UserId::new(), deal_input(dead.id)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_yield_one_deal() {
    let gateway = InMemoryPersistenceGateway::new();
    let (engine, _channels) = engine(&gateway);
    let org = OrgId::new();
    let lead = qualified_lead(&engine, org, "18 Harbor Rd", "IL").await;

    let first = {
        let deals = engine.deals().clone();
        tokio::spawn(async move { deals.create(org, UserId::new(), deal_input(lead.id)).await })
    };
    let second = {
        let deals = engine.deals().clone();
        tokio::spawn(async move { deals.create(org, UserId::new(), deal_input(lead.id)).await })
    };
    let (first, second) = tokio::join!(first, second);
    let results = [first.unwrap(), second.unwrap()];

    let created: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(created.len(), 1);
    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    match rejected {
        LifecycleError::DuplicateDeal { existing_id } => assert_eq!(*existing_id, created[0].id),
        other => panic!("expected DuplicateDeal, got {other:?}"),
    }

    let in_progress = engine
        .deals()
        .list_for_org(org)
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.status == DealStatus::InProgress)
        .count();
    assert_eq!(in_progress, 1);
}

#[tokio::test]
async fn test_failed_commit_leaves_lead_and_deals_untouched() {
    let gateway = InMemoryPersistenceGateway::new();
    let (engine, _channels) = engine(&gateway);
    let org = OrgId::new();
    let lead = qualified_lead(&engine, org, "19 Harbor Rd", "IL").await;

    gateway.set_fail_commits(true);
    let err = engine.deals().create(org, UserId::new(), deal_input(lead.id)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    gateway.set_fail_commits(false);

    assert_eq!(engine.leads().get(lead.id).await.unwrap().status, LeadStatus::Qualified);
    assert!(engine.deals().list_for_org(org).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_are_cached_until_a_deal_changes() {
    let gateway = InMemoryPersistenceGateway::new();
    let cache = InMemoryAggregateCache::new();
    let (engine, _channels) = LifecycleEngine::builder(EngineConfigSpec::default())
        .gateway(Arc::new(gateway.clone()))
        .cache(Arc::new(cache.clone()))
        .build()
        .unwrap();
    let org = OrgId::new();

    let first = qualified_lead(&engine, org, "20 Harbor Rd", "IL").await;
    let second = qualified_lead(&engine, org, "21 Harbor Rd", "IL").await;
    let keep = engine.deals().create(org, UserId::new(), deal_input(first.id)).await.unwrap();
    engine.deals().create(org, UserId::new(), deal_input(second.id)).await.unwrap();

    let metrics = engine.deals().get_metrics(org).await.unwrap();
    assert_eq!(metrics.total, 2);
    assert_eq!(metrics.in_progress, 2);
    assert!(cache.is_cached(org));

    engine.deals().close(keep.id, closing(dec!(12000))).await.unwrap();
    assert!(!cache.is_cached(org));

    let metrics = engine.deals().get_metrics(org).await.unwrap();
    assert_eq!(metrics.closed, 1);
    assert_eq!(metrics.in_progress, 1);
    assert_eq!(metrics.total_profit, dec!(12000));
    assert_eq!(metrics.close_rate, dec!(50));
}

/// Cache whose `put_metrics` waits for a release signal
#[derive(Clone)]
struct GatedCache {
    inner: InMemoryAggregateCache,
    parked: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl AggregateCache for GatedCache {
    async fn invalidate(&self, org_id: OrgId) -> Result<(), SinkError> {
        self.inner.invalidate(org_id).await
    }

    async fn generation(&self, org_id: OrgId) -> u64 {
        self.inner.generation(org_id).await
    }

    async fn get_metrics(&self, org_id: OrgId) -> Option<DealMetrics> {
        self.inner.get_metrics(org_id).await
    }

    async fn put_metrics(&self, org_id: OrgId, generation: u64, metrics: DealMetrics) -> bool {
        self.parked.notify_one();
        self.release.notified().await;
        self.inner.put_metrics(org_id, generation, metrics).await
    }
}

#[tokio::test]
async fn test_metrics_computed_before_a_close_are_not_cached_after_it() {
    let gateway = InMemoryPersistenceGateway::new();
    let cache = GatedCache {
        inner: InMemoryAggregateCache::new(),
        parked: Arc::new(Notify::new()),
        release: Arc::new(Notify::new()),
    };
    let (engine, _channels) = LifecycleEngine::builder(EngineConfigSpec::default())
        .gateway(Arc::new(gateway.clone()))
        .cache(Arc::new(cache.clone()))
        .build()
        .unwrap();
    let org = OrgId::new();

    let lead = qualified_lead(&engine, org, "30 Quarry Ln", "OH").await;
    let deal = engine.deals().create(org, UserId::new(), deal_input(lead.id)).await.unwrap();

    // Read metrics and stop right before they are stored
    let deals = engine.deals().clone();
    let read = tokio::spawn(async move { deals.get_metrics(org).await });
    cache.parked.notified().await;

    engine.deals().close(deal.id, closing(dec!(9000))).await.unwrap();
    cache.release.notify_one();

    let stale = read.await.unwrap().unwrap();
    assert_eq!(stale.in_progress, 1);
    assert!(!cache.inner.is_cached(org));

    let fresh = tokio::spawn({
        let deals = engine.deals().clone();
        async move { deals.get_metrics(org).await }
    });
    cache.parked.notified().await;
    cache.release.notify_one();
    let fresh = fresh.await.unwrap().unwrap();
    assert_eq!(fresh.closed, 1);
    assert_eq!(fresh.in_progress, 0);
    assert!(cache.inner.is_cached(org));
}
