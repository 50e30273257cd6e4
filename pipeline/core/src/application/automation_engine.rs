// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Automation Rule Engine
//!
//! Dispatches committed lifecycle triggers to the registered rules.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Select, evaluate and execute automation rules
//! - **Collaborators:**
//!   - Domain: AutomationRule, TriggerContext, RuleEffect
//!   - Infrastructure: RealtimeSink, NotificationSink, EventQueue
//!
//! The registry is an explicit object built at startup and passed in, so each
//! test can build its own. Rules can only be toggled afterwards, globally or
//! per organization.
//!
//! Every rule runs in isolation: a predicate or action that errors or panics
//! is logged and counted, and the remaining rules still run. Automation only
//! ever runs after the triggering transaction has committed.

use dashmap::DashMap;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::automation::{
    AutomationError, AutomationRule, RuleEffect, SubjectRef, TriggerContext, TriggerType,
};
use crate::domain::events::{
    DomainEventRecord, EventType, Notification, NotificationCategory, RealtimeEvent,
};
use crate::domain::identity::OrgId;
use crate::domain::side_effects::{EventQueue, NotificationSink, RealtimeSink};

struct RegisteredRule {
    rule: Arc<dyn AutomationRule>,
    enabled: AtomicBool,
    org_overrides: DashMap<OrgId, bool>,
}

impl RegisteredRule {
    fn enabled_for(&self, org_id: OrgId) -> bool {
        self.org_overrides
            .get(&org_id)
            .map(|entry| *entry)
            .unwrap_or_else(|| self.enabled.load(Ordering::SeqCst))
    }
}

/// Listing entry for a registered rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDescriptor {
    pub id: String,
    pub name: String,
    pub trigger: TriggerType,
    pub enabled: bool,
}

/// Rules known to the engine, in registration order
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<RegisteredRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. A rule whose id is already registered replaces the earlier one.
    pub fn register<R: AutomationRule + 'static>(&mut self, rule: R) -> &mut Self {
        let rule: Arc<dyn AutomationRule> = Arc::new(rule);
        let entry = RegisteredRule {
            enabled: AtomicBool::new(rule.enabled_by_default()),
            org_overrides: DashMap::new(),
            rule,
        };
        match self.rules.iter_mut().find(|r| r.rule.id() == entry.rule.id()) {
            Some(existing) => {
                warn!(rule_id = entry.rule.id(), "Replacing previously registered automation rule");
                *existing = entry;
            }
            None => self.rules.push(entry),
        }
        self
    }

    /// Global toggle. Returns false when the rule id is unknown.
    pub fn set_enabled(&self, rule_id: &str, enabled: bool) -> bool {
        match self.find(rule_id) {
            Some(entry) => {
                entry.enabled.store(enabled, Ordering::SeqCst);
                info!(rule_id, enabled, "Automation rule toggled");
                true
            }
            None => false,
        }
    }

    /// Per-organization toggle, taking precedence over the global one
    pub fn set_enabled_for_org(&self, rule_id: &str, org_id: OrgId, enabled: bool) -> bool {
        match self.find(rule_id) {
            Some(entry) => {
                entry.org_overrides.insert(org_id, enabled);
                info!(rule_id, org_id = %org_id, enabled, "Automation rule toggled for organization");
                true
            }
            None => false,
        }
    }

    pub fn is_enabled_for(&self, rule_id: &str, org_id: OrgId) -> Option<bool> {
        self.find(rule_id).map(|entry| entry.enabled_for(org_id))
    }

    /// Enabled rules for `trigger` in `org_id`
    pub fn rules_for(&self, trigger: TriggerType, org_id: OrgId) -> Vec<Arc<dyn AutomationRule>> {
        self.rules
            .iter()
            .filter(|r| r.rule.trigger() == trigger && r.enabled_for(org_id))
            .map(|r| r.rule.clone())
            .collect()
    }

    pub fn descriptors(&self) -> Vec<RuleDescriptor> {
        self.rules
            .iter()
            .map(|r| RuleDescriptor {
                id: r.rule.id().to_string(),
                name: r.rule.name().to_string(),
                trigger: r.rule.trigger(),
                enabled: r.enabled.load(Ordering::SeqCst),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn find(&self, rule_id: &str) -> Option<&RegisteredRule> {
        self.rules.iter().find(|r| r.rule.id() == rule_id)
    }
}

/// What one `run_automation` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutomationReport {
    /// Rules whose action ran
    pub executed: Vec<String>,
    /// Rules whose predicate did not hold
    pub skipped: Vec<String>,
    /// Rules that failed, with the error text
    pub failed: Vec<(String, String)>,
}

pub struct AutomationEngine {
    registry: Arc<RuleRegistry>,
    realtime: Arc<dyn RealtimeSink>,
    notifications: Arc<dyn NotificationSink>,
    event_queue: Arc<dyn EventQueue>,
}

impl AutomationEngine {
    pub fn new(
        registry: Arc<RuleRegistry>,
        realtime: Arc<dyn RealtimeSink>,
        notifications: Arc<dyn NotificationSink>,
        event_queue: Arc<dyn EventQueue>,
    ) -> Self {
        Self {
            registry,
            realtime,
            notifications,
            event_queue,
        }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Run every enabled rule for the context's trigger
    pub fn run_automation(&self, ctx: &TriggerContext) -> AutomationReport {
        let trigger = ctx.trigger_type();
        let rules = self.registry.rules_for(trigger, ctx.org_id);
        debug!(trigger = %trigger, org_id = %ctx.org_id, candidates = rules.len(), "Running automation");

        let mut report = AutomationReport::default();
        for rule in rules {
            let rule_id = rule.id().to_string();
            match Self::evaluate(rule.as_ref(), ctx) {
                Ok(None) => report.skipped.push(rule_id),
                Ok(Some(effects)) => {
                    self.apply(rule.as_ref(), ctx, effects);
                    metrics::counter!("dealflow_automation_rules_executed_total", "rule" => rule_id.clone())
                        .increment(1);
                    report.executed.push(rule_id);
                }
                Err(e) => {
                    warn!(rule_id = %rule_id, trigger = %trigger, error = %e, "Automation rule failed");
                    metrics::counter!("dealflow_automation_rule_failures_total", "rule" => rule_id.clone())
                        .increment(1);
                    report.failed.push((rule_id, e.to_string()));
                }
            }
        }
        report
    }

    /// `Ok(None)` when the predicate is false
    fn evaluate(
        rule: &dyn AutomationRule,
        ctx: &TriggerContext,
    ) -> Result<Option<Vec<RuleEffect>>, AutomationError> {
        let guarded = catch_unwind(AssertUnwindSafe(|| {
            if rule.matches(ctx)? {
                rule.execute(ctx).map(Some)
            } else {
                Ok(None)
            }
        }));
        guarded.unwrap_or_else(|_| Err(AutomationError::Panicked(rule.id().to_string())))
    }

    fn apply(&self, rule: &dyn AutomationRule, ctx: &TriggerContext, effects: Vec<RuleEffect>) {
        let subject = ctx.subject();

        for effect in &effects {
            let (subject_id, event_type, metadata) = match effect {
                RuleEffect::LogContact { lead_id, note } => (
                    lead_id.0,
                    EventType::ContactLogged,
                    serde_json::json!({ "note": note, "rule_id": rule.id() }),
                ),
                RuleEffect::AddNote { subject, note } => (
                    subject.uuid(),
                    EventType::NoteAdded,
                    serde_json::json!({ "note": note, "rule_id": rule.id() }),
                ),
                RuleEffect::FlagDeal { deal_id, reason } => (
                    deal_id.0,
                    EventType::DealFlagged,
                    serde_json::json!({ "reason": reason, "rule_id": rule.id() }),
                ),
                RuleEffect::FlagLead { lead_id, reason } => (
                    lead_id.0,
                    EventType::LeadFlagged,
                    serde_json::json!({ "reason": reason, "rule_id": rule.id() }),
                ),
            };
            self.enqueue(DomainEventRecord::new(ctx.org_id, subject_id, event_type, metadata));
        }

        if let Err(e) = self.realtime.broadcast(
            ctx.org_id,
            RealtimeEvent::AutomationTriggered {
                rule_id: rule.id().to_string(),
                rule_name: rule.name().to_string(),
                trigger: ctx.trigger_type(),
                subject_id: subject.uuid(),
            },
        ) {
            warn!(rule_id = rule.id(), error = %e, "Failed to broadcast automation event");
            metrics::counter!("dealflow_side_effect_failures_total", "effect" => "realtime").increment(1);
        }

        self.enqueue(DomainEventRecord::new(
            ctx.org_id,
            subject.uuid(),
            EventType::AutomationExecuted,
            serde_json::json!({
                "rule_id": rule.id(),
                "rule_name": rule.name(),
                "trigger": ctx.trigger_type(),
                "effects": effects,
            }),
        ));

        let message = match subject {
            SubjectRef::Lead(id) => format!("Automation '{}' ran for lead {}", rule.name(), id),
            SubjectRef::Deal(id) => format!("Automation '{}' ran for deal {}", rule.name(), id),
        };
        if let Err(e) = self.notifications.notify(Notification {
            org_id: ctx.org_id,
            category: NotificationCategory::Automation,
            message,
            metadata: serde_json::json!({ "rule_id": rule.id(), "subject": subject }),
        }) {
            warn!(rule_id = rule.id(), error = %e, "Failed to send automation notification");
            metrics::counter!("dealflow_side_effect_failures_total", "effect" => "notification").increment(1);
        }

        info!(rule_id = rule.id(), trigger = %ctx.trigger_type(), effects = effects.len(), "Automation rule executed");
    }

    fn enqueue(&self, record: DomainEventRecord) {
        let event_type = record.event_type;
        if let Err(e) = self.event_queue.enqueue(record) {
            warn!(event_type = %event_type, error = %e, "Failed to enqueue automation event");
            metrics::counter!("dealflow_side_effect_failures_total", "effect" => "event_queue").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::automation::TriggerEvent;
    use crate::domain::engine_config::UnderwritingConfig;
    use crate::domain::identity::UserId;
    use crate::domain::lead::{Lead, LeadInput};
    use crate::domain::side_effects::SinkError;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::event_queue::ChannelEventQueue;
    use crate::infrastructure::notifications::ChannelNotificationSink;

    struct FixedRule {
        id: &'static str,
        outcome: fn() -> Result<bool, AutomationError>,
    }

    impl AutomationRule for FixedRule {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.id
        }

        fn trigger(&self) -> TriggerType {
            TriggerType::LeadCreated
        }

        fn matches(&self, _ctx: &TriggerContext) -> Result<bool, AutomationError> {
            (self.outcome)()
        }

        fn execute(&self, ctx: &TriggerContext) -> Result<Vec<RuleEffect>, AutomationError> {
            Ok(vec![RuleEffect::AddNote {
                subject: ctx.subject(),
                note: "hello".to_string(),
            }])
        }
    }

    struct BrokenQueue;

    impl EventQueue for BrokenQueue {
        fn enqueue(&self, _record: DomainEventRecord) -> Result<(), SinkError> {
            Err(SinkError::Closed { sink: "event_queue" })
        }
    }

    fn context() -> TriggerContext {
        let lead = Lead::create(
            OrgId::new(),
            UserId::new(),
            LeadInput {
                street: "1 Main St".to_string(),
                city: "Austin".to_string(),
                state: "TX".to_string(),
                zip: "78701".to_string(),
                ..LeadInput::default()
            },
            &UnderwritingConfig::default(),
        )
        .unwrap();
        TriggerContext::new(lead.org_id, lead.owner_id, TriggerEvent::LeadCreated { lead })
    }

    fn registry() -> RuleRegistry {
        let mut registry = RuleRegistry::new();
        registry
            .register(FixedRule {
                id: "errors",
                outcome: || {
                    Err(AutomationError::Predicate {
                        rule: "errors".to_string(),
                        reason: "boom".to_string(),
                    })
                },
            })
            .register(FixedRule {
                id: "panics",
                outcome: || panic!("rule bug"),
            })
            .register(FixedRule {
                id: "declines",
                outcome: || Ok(false),
            })
            .register(FixedRule {
                id: "runs",
                outcome: || Ok(true),
            });
        registry
    }

    #[tokio::test]
    async fn test_failing_rules_do_not_stop_others() {
        let (notifications, mut notification_rx) = ChannelNotificationSink::channel(8);
        let (queue, mut queue_rx) = ChannelEventQueue::channel(8);
        let engine = AutomationEngine::new(
            Arc::new(registry()),
            Arc::new(EventBus::new(8)),
            Arc::new(notifications),
            Arc::new(queue),
        );

        let report = engine.run_automation(&context());
        assert_eq!(report.executed, vec!["runs".to_string()]);
        assert_eq!(report.skipped, vec!["declines".to_string()]);
        assert_eq!(report.failed.len(), 2);

        assert_eq!(queue_rx.recv().await.unwrap().event_type, EventType::NoteAdded);
        assert_eq!(queue_rx.recv().await.unwrap().event_type, EventType::AutomationExecuted);
        assert_eq!(
            notification_rx.recv().await.unwrap().category,
            NotificationCategory::Automation
        );
    }

    #[tokio::test]
    async fn test_sink_failures_are_swallowed() {
        let (notifications, _rx) = ChannelNotificationSink::channel(1);
        let engine = AutomationEngine::new(
            Arc::new(registry()),
            Arc::new(EventBus::new(1)),
            Arc::new(notifications),
            Arc::new(BrokenQueue),
        );
        let report = engine.run_automation(&context());
        assert_eq!(report.executed, vec!["runs".to_string()]);
    }

    #[test]
    fn test_toggles() {
        let registry = registry();
        let org = OrgId::new();
        assert_eq!(registry.rules_for(TriggerType::LeadCreated, org).len(), 4);
        assert!(registry.rules_for(TriggerType::DealClosed, org).is_empty());

        assert!(registry.set_enabled("runs", false));
        assert_eq!(registry.is_enabled_for("runs", org), Some(false));
        assert!(registry.set_enabled_for_org("runs", org, true));
        assert_eq!(registry.is_enabled_for("runs", org), Some(true));
        assert_eq!(registry.is_enabled_for("runs", OrgId::new()), Some(false));

        assert!(!registry.set_enabled("missing", true));
        assert_eq!(registry.is_enabled_for("missing", org), None);
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = RuleRegistry::new();
        registry.register(FixedRule {
            id: "dup",
            outcome: || Ok(true),
        });
        registry.register(FixedRule {
            id: "dup",
            outcome: || Ok(false),
        });
        assert_eq!(registry.len(), 1);
        assert!(registry.rules_for(TriggerType::LeadCreated, OrgId::new()).len() == 1);
    }
}
