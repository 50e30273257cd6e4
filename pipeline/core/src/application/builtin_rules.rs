// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Built-in automation rules registered at startup.
//!
//! | Id | Trigger | Default |
//! |----|---------|---------|
//! | `auto-log-contact` | `status_change` new → contacted | enabled |
//! | `qualified-follow-up` | `status_change` → qualified | enabled |
//! | `high-value-deal` | `deal_created` with ARV ≥ threshold | enabled |
//! | `deal-closed-note` | `deal_closed` | enabled |
//! | `stale-lead` | `lead_stale` idle > N days | disabled, opt-in per org |

use rust_decimal::Decimal;

use crate::application::automation_engine::RuleRegistry;
use crate::domain::automation::{
    AutomationError, AutomationRule, RuleEffect, SubjectRef, TriggerContext, TriggerEvent, TriggerType,
};
use crate::domain::engine_config::AutomationConfig;
use crate::domain::lead::LeadStatus;

pub const AUTO_LOG_CONTACT: &str = "auto-log-contact";
pub const QUALIFIED_FOLLOW_UP: &str = "qualified-follow-up";
pub const HIGH_VALUE_DEAL: &str = "high-value-deal";
pub const DEAL_CLOSED_NOTE: &str = "deal-closed-note";
pub const STALE_LEAD: &str = "stale-lead";

fn unexpected(rule: &str, ctx: &TriggerContext) -> AutomationError {
    AutomationError::UnexpectedContext {
        rule: rule.to_string(),
        trigger: ctx.trigger_type(),
    }
}

/// Logs a contact event when a lead moves from `new` to `contacted`
pub struct AutoLogContactRule;

impl AutomationRule for AutoLogContactRule {
    fn id(&self) -> &str {
        AUTO_LOG_CONTACT
    }

    fn name(&self) -> &str {
        "Auto-log first contact"
    }

    fn trigger(&self) -> TriggerType {
        TriggerType::StatusChange
    }

    fn matches(&self, ctx: &TriggerContext) -> Result<bool, AutomationError> {
        match &ctx.event {
            TriggerEvent::StatusChange { from, to, .. } => {
                Ok(*from == LeadStatus::New && *to == LeadStatus::Contacted)
            }
            _ => Err(unexpected(self.id(), ctx)),
        }
    }

    fn execute(&self, ctx: &TriggerContext) -> Result<Vec<RuleEffect>, AutomationError> {
        let TriggerEvent::StatusChange { lead, .. } = &ctx.event else {
            return Err(unexpected(self.id(), ctx));
        };
        let note = match &lead.seller_name {
            Some(seller) => format!("First contact with {} logged", seller),
            None => "First contact with seller logged".to_string(),
        };
        Ok(vec![RuleEffect::LogContact {
            lead_id: lead.id,
            note,
        }])
    }
}

/// Adds a follow-up note when a lead becomes `qualified`
pub struct QualifiedFollowUpRule;

impl AutomationRule for QualifiedFollowUpRule {
    fn id(&self) -> &str {
        QUALIFIED_FOLLOW_UP
    }

    fn name(&self) -> &str {
        "Follow up on qualified lead"
    }

    fn trigger(&self) -> TriggerType {
        TriggerType::StatusChange
    }

    fn matches(&self, ctx: &TriggerContext) -> Result<bool, AutomationError> {
        match &ctx.event {
            TriggerEvent::StatusChange { to, .. } => Ok(*to == LeadStatus::Qualified),
            _ => Err(unexpected(self.id(), ctx)),
        }
    }

    fn execute(&self, ctx: &TriggerContext) -> Result<Vec<RuleEffect>, AutomationError> {
        let TriggerEvent::StatusChange { lead, .. } = &ctx.event else {
            return Err(unexpected(self.id(), ctx));
        };
        let note = match lead.max_offer_amount() {
            Some(max_offer) => format!(
                "Lead qualified. Prepare an offer at or below {} for {}",
                max_offer.round_dp(2),
                lead.address.street
            ),
            None => format!(
                "Lead qualified. Gather ARV and repair estimates for {}",
                lead.address.street
            ),
        };
        Ok(vec![RuleEffect::AddNote {
            subject: SubjectRef::Lead(lead.id),
            note,
        }])
    }
}

/// Flags deals created from leads whose ARV reaches the threshold
pub struct HighValueDealRule {
    threshold: Decimal,
}

impl HighValueDealRule {
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }
}

impl AutomationRule for HighValueDealRule {
    fn id(&self) -> &str {
        HIGH_VALUE_DEAL
    }

    fn name(&self) -> &str {
        "Flag high-value deal"
    }

    fn trigger(&self) -> TriggerType {
        TriggerType::DealCreated
    }

    fn matches(&self, ctx: &TriggerContext) -> Result<bool, AutomationError> {
        match &ctx.event {
            TriggerEvent::DealCreated { lead, .. } => {
                Ok(lead.underwriting.arv.is_some_and(|arv| arv >= self.threshold))
            }
            _ => Err(unexpected(self.id(), ctx)),
        }
    }

    fn execute(&self, ctx: &TriggerContext) -> Result<Vec<RuleEffect>, AutomationError> {
        let TriggerEvent::DealCreated { deal, lead } = &ctx.event else {
            return Err(unexpected(self.id(), ctx));
        };
        let arv = lead.underwriting.arv.unwrap_or_default();
        Ok(vec![RuleEffect::FlagDeal {
            deal_id: deal.id,
            reason: format!("High-value deal: ARV {} meets the {} threshold", arv, self.threshold),
        }])
    }
}

/// Records a note on every closed deal
pub struct DealClosedNoteRule;

impl AutomationRule for DealClosedNoteRule {
    fn id(&self) -> &str {
        DEAL_CLOSED_NOTE
    }

    fn name(&self) -> &str {
        "Celebrate closed deal"
    }

    fn trigger(&self) -> TriggerType {
        TriggerType::DealClosed
    }

    fn matches(&self, ctx: &TriggerContext) -> Result<bool, AutomationError> {
        match &ctx.event {
            TriggerEvent::DealClosed { .. } => Ok(true),
            _ => Err(unexpected(self.id(), ctx)),
        }
    }

    fn execute(&self, ctx: &TriggerContext) -> Result<Vec<RuleEffect>, AutomationError> {
        let TriggerEvent::DealClosed { deal } = &ctx.event else {
            return Err(unexpected(self.id(), ctx));
        };
        Ok(vec![RuleEffect::AddNote {
            subject: SubjectRef::Deal(deal.id),
            note: format!("Deal closed with {} profit. Nice work!", deal.profit.round_dp(2)),
        }])
    }
}

/// Flags leads idle for more than `stale_days`
pub struct StaleLeadRule {
    stale_days: i64,
}

impl StaleLeadRule {
    pub fn new(stale_days: i64) -> Self {
        Self { stale_days }
    }
}

impl AutomationRule for StaleLeadRule {
    fn id(&self) -> &str {
        STALE_LEAD
    }

    fn name(&self) -> &str {
        "Flag stale lead"
    }

    fn trigger(&self) -> TriggerType {
        TriggerType::LeadStale
    }

    fn enabled_by_default(&self) -> bool {
        false
    }

    fn matches(&self, ctx: &TriggerContext) -> Result<bool, AutomationError> {
        match &ctx.event {
            TriggerEvent::LeadStale { idle_days, .. } => Ok(*idle_days > self.stale_days),
            _ => Err(unexpected(self.id(), ctx)),
        }
    }

    fn execute(&self, ctx: &TriggerContext) -> Result<Vec<RuleEffect>, AutomationError> {
        let TriggerEvent::LeadStale { lead, idle_days } = &ctx.event else {
            return Err(unexpected(self.id(), ctx));
        };
        Ok(vec![RuleEffect::FlagLead {
            lead_id: lead.id,
            reason: format!("No activity for {} days", idle_days),
        }])
    }
}

/// Registry with every built-in rule, stale-lead opted in for the configured orgs
pub fn builtin_registry(config: &AutomationConfig) -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    registry
        .register(AutoLogContactRule)
        .register(QualifiedFollowUpRule)
        .register(HighValueDealRule::new(config.high_value_arv_threshold))
        .register(DealClosedNoteRule)
        .register(StaleLeadRule::new(config.stale_lead_days));
    for org_id in &config.stale_lead_orgs {
        registry.set_enabled_for_org(STALE_LEAD, *org_id, true);
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deal::{Deal, DealType, NewDeal};
    use crate::domain::engine_config::UnderwritingConfig;
    use crate::domain::identity::{OrgId, UserId};
    use crate::domain::lead::{Lead, LeadInput};
    use rust_decimal_macros::dec;

    fn lead(arv: Option<Decimal>) -> Lead {
        Lead::create(
            OrgId::new(),
            UserId::new(),
            LeadInput {
                street: "400 Oak Ave".to_string(),
                city: "Tampa".to_string(),
                state: "FL".to_string(),
                zip: "33602".to_string(),
                seller_name: Some("Pat Doe".to_string()),
                arv,
                ..LeadInput::default()
            },
            &UnderwritingConfig::default(),
        )
        .unwrap()
    }

    fn status_ctx(from: LeadStatus, to: LeadStatus) -> TriggerContext {
        let lead = lead(None);
        TriggerContext::new(lead.org_id, lead.owner_id, TriggerEvent::StatusChange { lead, from, to })
    }

    #[test]
    fn test_contact_rule_only_on_new_to_contacted() {
        let rule = AutoLogContactRule;
        assert!(rule.matches(&status_ctx(LeadStatus::New, LeadStatus::Contacted)).unwrap());
        assert!(!rule.matches(&status_ctx(LeadStatus::New, LeadStatus::Qualified)).unwrap());

        let effects = rule.execute(&status_ctx(LeadStatus::New, LeadStatus::Contacted)).unwrap();
        assert!(matches!(&effects[0], RuleEffect::LogContact { note, .. } if note.contains("Pat Doe")));
    }

    #[test]
    fn test_rules_reject_foreign_context() {
        let lead = lead(None);
        let ctx = TriggerContext::new(lead.org_id, lead.owner_id, TriggerEvent::LeadCreated { lead });
        assert!(matches!(
            QualifiedFollowUpRule.matches(&ctx),
            Err(AutomationError::UnexpectedContext { .. })
        ));
    }

    #[test]
    fn test_high_value_threshold_is_inclusive() {
        let rule = HighValueDealRule::new(dec!(500000));
        for (arv, expected) in [(Some(dec!(500000)), true), (Some(dec!(499999)), false), (None, false)] {
            let lead = lead(arv);
            let deal = Deal::open(NewDeal {
                org_id: lead.org_id,
                lead_id: lead.id,
                created_by: UserId::new(),
                deal_type: DealType::Assignment,
                buyer_name: None,
                assignment_fee: dec!(10000),
            });
            let ctx = TriggerContext::new(lead.org_id, UserId::new(), TriggerEvent::DealCreated { deal, lead });
            assert_eq!(rule.matches(&ctx).unwrap(), expected);
        }
    }

    #[test]
    fn test_builtin_registry_defaults() {
        let opted_in = OrgId::new();
        let config = AutomationConfig {
            stale_lead_orgs: vec![opted_in],
            ..AutomationConfig::default()
        };
        let registry = builtin_registry(&config);
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.is_enabled_for(STALE_LEAD, OrgId::new()), Some(false));
        assert_eq!(registry.is_enabled_for(STALE_LEAD, opted_in), Some(true));
        assert_eq!(registry.rules_for(TriggerType::StatusChange, OrgId::new()).len(), 2);
    }

    #[test]
    fn test_stale_rule_threshold() {
        let rule = StaleLeadRule::new(30);
        let lead = lead(None);
        let ctx = |idle_days| {
            TriggerContext::new(
                lead.org_id,
                UserId::system(),
                TriggerEvent::LeadStale {
                    lead: lead.clone(),
                    idle_days,
                },
            )
        };
        assert!(!rule.matches(&ctx(29)).unwrap());
        assert!(!rule.matches(&ctx(30)).unwrap());
        assert!(rule.matches(&ctx(31)).unwrap());
    }
}
