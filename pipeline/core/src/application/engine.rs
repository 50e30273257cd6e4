// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Composition root for the lifecycle engine.
//!
//! Wires the persistence gateway, sinks, automation registry and the three
//! lifecycle services from one [`EngineConfigSpec`]. Every collaborator can be
//! swapped through the builder; anything left unset gets the in-memory
//! implementation.
//!
//! `build()` spawns the event-log flusher and must run inside a tokio runtime.

use anyhow::Context;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::application::automation_engine::{AutomationEngine, RuleRegistry};
use crate::application::builtin_rules::builtin_registry;
use crate::application::deal_lifecycle::{DealLifecycleService, StandardDealLifecycleService};
use crate::application::event_log_flusher::{EventLogFlusher, FlushStats};
use crate::application::lead_lifecycle::{LeadLifecycleService, StandardLeadLifecycleService};
use crate::application::legal_stage_service::{LegalStageService, StandardLegalStageService};
use crate::application::needs_attention::NeedsAttentionAggregator;
use crate::application::post_commit::EffectDispatcher;
use crate::domain::engine_config::EngineConfigSpec;
use crate::domain::events::Notification;
use crate::domain::jurisdiction::JurisdictionRuleProvider;
use crate::domain::repository::PersistenceGateway;
use crate::domain::side_effects::AggregateCache;
use crate::infrastructure::{
    ChannelEventQueue, ChannelNotificationSink, EventBus, InMemoryAggregateCache, InMemoryPersistenceGateway,
    YamlJurisdictionProvider,
};

pub struct LifecycleEngine {
    leads: Arc<dyn LeadLifecycleService>,
    deals: Arc<dyn DealLifecycleService>,
    stages: Arc<dyn LegalStageService>,
    attention: Arc<NeedsAttentionAggregator>,
    registry: Arc<RuleRegistry>,
    event_bus: EventBus,
    gateway: Arc<dyn PersistenceGateway>,
}

/// Receiving ends handed back to the host
pub struct EngineChannels {
    /// Notifications for the delivery worker
    pub notifications: mpsc::Receiver<Notification>,
    /// Background event-log flusher
    pub flusher: JoinHandle<FlushStats>,
}

impl EngineChannels {
    /// Drop the engine and wait until the flusher has written every queued
    /// event. Services cloned out of the engine keep the queue open.
    pub async fn shutdown(self, engine: LifecycleEngine) -> anyhow::Result<FlushStats> {
        drop(engine);
        self.flusher.await.context("Event log flusher task failed")
    }
}

impl LifecycleEngine {
    pub fn builder(config: EngineConfigSpec) -> LifecycleEngineBuilder {
        LifecycleEngineBuilder::new(config)
    }

    pub fn leads(&self) -> &Arc<dyn LeadLifecycleService> {
        &self.leads
    }

    pub fn deals(&self) -> &Arc<dyn DealLifecycleService> {
        &self.deals
    }

    pub fn stages(&self) -> &Arc<dyn LegalStageService> {
        &self.stages
    }

    pub fn attention(&self) -> &Arc<NeedsAttentionAggregator> {
        &self.attention
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }
}

pub struct LifecycleEngineBuilder {
    config: EngineConfigSpec,
    gateway: Option<Arc<dyn PersistenceGateway>>,
    jurisdictions: Option<Arc<dyn JurisdictionRuleProvider>>,
    registry: Option<RuleRegistry>,
    cache: Option<Arc<dyn AggregateCache>>,
    event_bus: Option<EventBus>,
}

impl LifecycleEngineBuilder {
    pub fn new(config: EngineConfigSpec) -> Self {
        Self {
            config,
            gateway: None,
            jurisdictions: None,
            registry: None,
            cache: None,
            event_bus: None,
        }
    }

    pub fn gateway(mut self, gateway: Arc<dyn PersistenceGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn jurisdictions(mut self, provider: Arc<dyn JurisdictionRuleProvider>) -> Self {
        self.jurisdictions = Some(provider);
        self
    }

    /// Replace the built-in rule registry
    pub fn registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn AggregateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> anyhow::Result<(LifecycleEngine, EngineChannels)> {
        let config = self.config;
        let sinks = &config.side_effects;

        let gateway = self
            .gateway
            .unwrap_or_else(|| Arc::new(InMemoryPersistenceGateway::new()));
        let jurisdictions: Arc<dyn JurisdictionRuleProvider> = match (self.jurisdictions, &config.jurisdictions) {
            (Some(provider), _) => provider,
            (None, Some(files)) => Arc::new(YamlJurisdictionProvider::from_yaml_file(&files.profiles_path)?),
            (None, None) => Arc::new(YamlJurisdictionProvider::empty()),
        };
        let registry = Arc::new(
            self.registry
                .unwrap_or_else(|| builtin_registry(&config.automation)),
        );
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(InMemoryAggregateCache::new()));
        let event_bus = self
            .event_bus
            .unwrap_or_else(|| EventBus::new(sinks.realtime_capacity));

        let (notifications, notification_rx) = ChannelNotificationSink::channel(sinks.notification_capacity);
        let (event_queue, event_rx) = ChannelEventQueue::channel(sinks.event_queue_capacity);
        let notifications = Arc::new(notifications);

        let automation = Arc::new(AutomationEngine::new(
            registry.clone(),
            Arc::new(event_bus.clone()),
            notifications.clone(),
            Arc::new(event_queue),
        ));
        let dispatcher = Arc::new(EffectDispatcher::new(
            cache,
            Arc::new(event_bus.clone()),
            notifications,
            automation,
        ));

        let flusher = Arc::new(EventLogFlusher::new(gateway.clone(), sinks.event_flush_batch_size)).start(event_rx);

        let engine = LifecycleEngine {
            leads: Arc::new(StandardLeadLifecycleService::new(
                gateway.clone(),
                dispatcher.clone(),
                config.underwriting.clone(),
            )),
            deals: Arc::new(StandardDealLifecycleService::new(gateway.clone(), dispatcher.clone())),
            stages: Arc::new(StandardLegalStageService::new(gateway.clone(), jurisdictions, dispatcher)),
            attention: Arc::new(NeedsAttentionAggregator::new(gateway.clone(), config.attention.clone())),
            registry,
            event_bus,
            gateway,
        };

        info!(rules = engine.registry.len(), "Lifecycle engine ready");
        Ok((
            engine,
            EngineChannels {
                notifications: notification_rx,
                flusher,
            },
        ))
    }
}
