// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Post-Commit Effects
//!
//! Every lifecycle operation ends in two phases: one atomic transaction, then
//! a [`PostCommitEffects`] value handed to the [`EffectDispatcher`]. The
//! dispatcher only ever sees effects of a transaction that already committed.
//!
//! Each effect is delivered independently. A failing cache, a full channel or
//! a broken automation rule is logged and counted, and never changes the
//! result of the operation that produced it.
//!
//! Delivery order: cache invalidation, realtime broadcasts, notifications,
//! then automation.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::automation_engine::{AutomationEngine, AutomationReport};
use crate::domain::automation::TriggerContext;
use crate::domain::events::{Notification, RealtimeEvent};
use crate::domain::identity::OrgId;
use crate::domain::side_effects::{AggregateCache, NotificationSink, RealtimeSink};

/// Side effects collected while a lifecycle transaction runs
#[derive(Debug, Clone)]
pub struct PostCommitEffects {
    pub org_id: OrgId,
    pub invalidate_cache: bool,
    pub broadcasts: Vec<RealtimeEvent>,
    pub notifications: Vec<Notification>,
    pub automation: Vec<TriggerContext>,
}

impl PostCommitEffects {
    pub fn for_org(org_id: OrgId) -> Self {
        Self {
            org_id,
            invalidate_cache: false,
            broadcasts: Vec::new(),
            notifications: Vec::new(),
            automation: Vec::new(),
        }
    }

    pub fn invalidate_cache(mut self) -> Self {
        self.invalidate_cache = true;
        self
    }

    pub fn broadcast(mut self, event: RealtimeEvent) -> Self {
        self.broadcasts.push(event);
        self
    }

    pub fn notify(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    pub fn automation(mut self, ctx: TriggerContext) -> Self {
        self.automation.push(ctx);
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.invalidate_cache
            && self.broadcasts.is_empty()
            && self.notifications.is_empty()
            && self.automation.is_empty()
    }
}

/// What happened while delivering one [`PostCommitEffects`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Sink deliveries that failed (cache, realtime, notification)
    pub failures: usize,
    /// One report per automation trigger, in order
    pub automation: Vec<AutomationReport>,
}

pub struct EffectDispatcher {
    cache: Arc<dyn AggregateCache>,
    realtime: Arc<dyn RealtimeSink>,
    notifications: Arc<dyn NotificationSink>,
    automation: Arc<AutomationEngine>,
}

impl EffectDispatcher {
    pub fn new(
        cache: Arc<dyn AggregateCache>,
        realtime: Arc<dyn RealtimeSink>,
        notifications: Arc<dyn NotificationSink>,
        automation: Arc<AutomationEngine>,
    ) -> Self {
        Self {
            cache,
            realtime,
            notifications,
            automation,
        }
    }

    pub fn cache(&self) -> &Arc<dyn AggregateCache> {
        &self.cache
    }

    pub async fn dispatch(&self, effects: PostCommitEffects) -> DispatchOutcome {
        let PostCommitEffects {
            org_id,
            invalidate_cache,
            broadcasts,
            notifications,
            automation,
        } = effects;
        let mut outcome = DispatchOutcome::default();

        if invalidate_cache {
            if let Err(e) = self.cache.invalidate(org_id).await {
                warn!(org_id = %org_id, error = %e, "Cache invalidation failed");
                record_failure("cache");
                outcome.failures += 1;
            }
        }

        for event in broadcasts {
            if let Err(e) = self.realtime.broadcast(org_id, event) {
                warn!(org_id = %org_id, error = %e, "Realtime broadcast failed");
                record_failure("realtime");
                outcome.failures += 1;
            }
        }

        for notification in notifications {
            if let Err(e) = self.notifications.notify(notification) {
                warn!(org_id = %org_id, error = %e, "Notification delivery failed");
                record_failure("notification");
                outcome.failures += 1;
            }
        }

        for ctx in automation {
            outcome.automation.push(self.automation.run_automation(&ctx));
        }

        debug!(org_id = %org_id, failures = outcome.failures, "Post-commit effects dispatched");
        outcome
    }
}

fn record_failure(effect: &'static str) {
    metrics::counter!("dealflow_side_effect_failures_total", "effect" => effect).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::automation_engine::RuleRegistry;
    use crate::domain::deal::DealMetrics;
    use crate::domain::events::NotificationCategory;
    use crate::domain::lead::LeadId;
    use crate::domain::side_effects::SinkError;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::event_queue::ChannelEventQueue;
    use crate::infrastructure::notifications::ChannelNotificationSink;
    use async_trait::async_trait;

    struct DownCache;

    #[async_trait]
    impl AggregateCache for DownCache {
        async fn invalidate(&self, _org_id: OrgId) -> Result<(), SinkError> {
            Err(SinkError::Unavailable {
                sink: "cache",
                reason: "connection refused".to_string(),
            })
        }

        async fn generation(&self, _org_id: OrgId) -> u64 {
            0
        }

        async fn get_metrics(&self, _org_id: OrgId) -> Option<DealMetrics> {
            None
        }

        async fn put_metrics(&self, _org_id: OrgId, _generation: u64, _metrics: DealMetrics) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_failed_cache_does_not_stop_other_effects() {
        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe();
        let (notifications, mut notification_rx) = ChannelNotificationSink::channel(8);
        let (queue, _queue_rx) = ChannelEventQueue::channel(8);
        let notifications = Arc::new(notifications);
        let engine = Arc::new(AutomationEngine::new(
            Arc::new(RuleRegistry::new()),
            Arc::new(bus.clone()),
            notifications.clone(),
            Arc::new(queue),
        ));
        let dispatcher = EffectDispatcher::new(Arc::new(DownCache), Arc::new(bus), notifications, engine);

        let org = OrgId::new();
        let lead_id = LeadId::new();
        let effects = PostCommitEffects::for_org(org)
            .invalidate_cache()
            .broadcast(RealtimeEvent::LeadCreated { lead_id })
            .notify(Notification {
                org_id: org,
                category: NotificationCategory::DealClosed,
                message: "closed".to_string(),
                metadata: serde_json::Value::Null,
            });
        assert!(!effects.is_empty());

        let outcome = dispatcher.dispatch(effects).await;
        assert_eq!(outcome.failures, 1);
        assert_eq!(receiver.recv().await.unwrap().event, RealtimeEvent::LeadCreated { lead_id });
        assert_eq!(notification_rx.recv().await.unwrap().message, "closed");
    }

    #[test]
    fn test_empty_effects() {
        assert!(PostCommitEffects::for_org(OrgId::new()).is_empty());
    }
}
