// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Needs-Attention Signals
//!
//! Advisory risk indicators inferred from a deal's current state. Nothing here
//! writes; signals are recomputed on every scan.
//!
//! Staleness and close-date signals only apply to `in_progress` deals. Issue
//! integrity signals apply to every deal.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::deal::{Deal, DealId, DealStatus};
use crate::domain::engine_config::AttentionThresholds;
use crate::domain::events::{DomainEventRecord, EventType};
use crate::domain::issue::DealIssue;
use crate::domain::metadata::DealMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    NoActivity,
    StageUnchanged,
    OpenBlockingIssues,
    OldOpenIssues,
    CloseDatePassed,
    CloseDateApproaching,
    LateStageWithIssues,
    ClosedWithIssues,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoActivity => "no_activity",
            Self::StageUnchanged => "stage_unchanged",
            Self::OpenBlockingIssues => "open_blocking_issues",
            Self::OldOpenIssues => "old_open_issues",
            Self::CloseDatePassed => "close_date_passed",
            Self::CloseDateApproaching => "close_date_approaching",
            Self::LateStageWithIssues => "late_stage_with_issues",
            Self::ClosedWithIssues => "closed_with_issues",
        }
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionSignal {
    pub deal_id: DealId,
    pub signal: SignalType,
    pub message: String,
}

/// Everything the evaluator reads about one deal
#[derive(Debug, Clone, Copy)]
pub struct DealSnapshot<'a> {
    pub deal: &'a Deal,
    /// Events whose subject is the deal
    pub events: &'a [DomainEventRecord],
    pub issues: &'a [DealIssue],
    pub metadata: &'a DealMetadata,
}

/// Classify an expected close date against `today`. `None` when the date is
/// more than `warning_days` away.
pub fn classify_close_date(expected: NaiveDate, today: NaiveDate, warning_days: i64) -> Option<SignalType> {
    let remaining = (expected - today).num_days();
    if remaining < 0 {
        Some(SignalType::CloseDatePassed)
    } else if remaining <= warning_days {
        Some(SignalType::CloseDateApproaching)
    } else {
        None
    }
}

pub fn evaluate_deal(
    snapshot: DealSnapshot<'_>,
    thresholds: &AttentionThresholds,
    now: DateTime<Utc>,
) -> Vec<AttentionSignal> {
    let deal = snapshot.deal;
    let mut signals = Vec::new();
    let mut push = |signal: SignalType, message: String| {
        signals.push(AttentionSignal {
            deal_id: deal.id,
            signal,
            message,
        })
    };

    if deal.status == DealStatus::InProgress {
        let last_activity = snapshot
            .events
            .iter()
            .map(|e| e.occurred_at)
            .max()
            .map_or(deal.created_at, |latest| latest.max(deal.created_at));
        let idle = (now - last_activity).num_days();
        if idle >= thresholds.no_activity_days {
            push(SignalType::NoActivity, format!("no activity in {} days", idle));
        }

        let last_stage_change = snapshot
            .events
            .iter()
            .filter(|e| e.event_type == EventType::StageTransition)
            .map(|e| e.occurred_at)
            .max()
            .unwrap_or(deal.created_at);
        let unchanged = (now - last_stage_change).num_days();
        if unchanged >= thresholds.stage_unchanged_days {
            push(
                SignalType::StageUnchanged,
                format!("stage {} unchanged for {} days", deal.stage, unchanged),
            );
        }

        if let Some(expected) = snapshot.metadata.expected_close_date() {
            let today = now.date_naive();
            match classify_close_date(expected, today, thresholds.close_date_warning_days) {
                Some(SignalType::CloseDatePassed) => push(
                    SignalType::CloseDatePassed,
                    format!(
                        "expected close date {} passed {} days ago",
                        expected,
                        (today - expected).num_days()
                    ),
                ),
                Some(signal) => push(
                    signal,
                    format!(
                        "expected close date {} is in {} days",
                        expected,
                        (expected - today).num_days()
                    ),
                ),
                None => {}
            }
        }
    }

    let open: Vec<&DealIssue> = snapshot.issues.iter().filter(|i| i.is_open()).collect();
    let blocking = open.iter().filter(|i| i.is_open_blocking()).count();
    if blocking > 0 {
        push(
            SignalType::OpenBlockingIssues,
            format!("{} open blocking issue(s)", blocking),
        );
    }

    let old_cutoff = now - Duration::days(thresholds.old_issue_days);
    let old = open.iter().filter(|i| i.discovered_at <= old_cutoff).count();
    if old > 0 {
        push(
            SignalType::OldOpenIssues,
            format!("{} issue(s) open for {}+ days", old, thresholds.old_issue_days),
        );
    }

    if deal.stage.is_late() && blocking > 0 {
        push(
            SignalType::LateStageWithIssues,
            format!("deal is in {} with blocking issues open", deal.stage),
        );
    }

    if deal.status == DealStatus::Closed && !open.is_empty() {
        push(
            SignalType::ClosedWithIssues,
            format!("deal is closed with {} issue(s) still open", open.len()),
        );
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deal::{DealType, NewDeal};
    use crate::domain::identity::{OrgId, UserId};
    use crate::domain::issue::{IssueSeverity, NewIssueInput};
    use crate::domain::lead::LeadId;
    use crate::domain::legal_stage::LegalStage;
    use crate::domain::metadata::TitleMetadata;
    use rust_decimal::Decimal;

    fn deal() -> Deal {
        Deal::open(NewDeal {
            org_id: OrgId::new(),
            lead_id: LeadId::new(),
            created_by: UserId::new(),
            deal_type: DealType::Assignment,
            buyer_name: None,
            assignment_fee: Decimal::ZERO,
        })
    }

    fn kinds(signals: &[AttentionSignal]) -> Vec<SignalType> {
        signals.iter().map(|s| s.signal).collect()
    }

    #[test]
    fn test_close_date_classification_is_exclusive() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        for offset in -40..40 {
            let expected = today + Duration::days(offset);
            let class = classify_close_date(expected, today, 7);
            match offset {
                o if o < 0 => assert_eq!(class, Some(SignalType::CloseDatePassed)),
                0..=7 => assert_eq!(class, Some(SignalType::CloseDateApproaching)),
                _ => assert_eq!(class, None),
            }
        }
    }

    #[test]
    fn test_fresh_deal_has_no_signals() {
        let deal = deal();
        let metadata = DealMetadata::default();
        let snapshot = DealSnapshot {
            deal: &deal,
            events: &[],
            issues: &[],
            metadata: &metadata,
        };
        assert!(evaluate_deal(snapshot, &AttentionThresholds::default(), Utc::now()).is_empty());
    }

    #[test]
    fn test_staleness_uses_thresholds() {
        let deal = deal();
        let metadata = DealMetadata::default();
        let snapshot = DealSnapshot {
            deal: &deal,
            events: &[],
            issues: &[],
            metadata: &metadata,
        };
        let thresholds = AttentionThresholds::default();

        let signals = evaluate_deal(snapshot, &thresholds, deal.created_at + Duration::days(15));
        assert_eq!(kinds(&signals), vec![SignalType::NoActivity]);

        let signals = evaluate_deal(snapshot, &thresholds, deal.created_at + Duration::days(22));
        assert_eq!(kinds(&signals), vec![SignalType::NoActivity, SignalType::StageUnchanged]);
    }

    #[test]
    fn test_recent_event_resets_activity() {
        let deal = deal();
        let metadata = DealMetadata::default();
        let now = deal.created_at + Duration::days(15);
        let events = vec![DomainEventRecord::new(
            deal.org_id,
            deal.id.0,
            EventType::ContractMetadataUpdated,
            serde_json::Value::Null,
        )
        .at(now - Duration::days(2))];
        let snapshot = DealSnapshot {
            deal: &deal,
            events: &events,
            issues: &[],
            metadata: &metadata,
        };
        assert!(evaluate_deal(snapshot, &AttentionThresholds::default(), now).is_empty());
    }

    #[test]
    fn test_close_date_signals_only_for_in_progress() {
        let mut deal = deal();
        let now = deal.created_at;
        let metadata = DealMetadata {
            title: Some(TitleMetadata {
                expected_close_date: Some(now.date_naive() - Duration::days(1)),
                ..TitleMetadata::default()
            }),
            ..DealMetadata::default()
        };
        let snapshot = DealSnapshot {
            deal: &deal,
            events: &[],
            issues: &[],
            metadata: &metadata,
        };
        assert_eq!(
            kinds(&evaluate_deal(snapshot, &AttentionThresholds::default(), now)),
            vec![SignalType::CloseDatePassed]
        );

        deal.status = DealStatus::Cancelled;
        let snapshot = DealSnapshot {
            deal: &deal,
            events: &[],
            issues: &[],
            metadata: &metadata,
        };
        assert!(evaluate_deal(snapshot, &AttentionThresholds::default(), now).is_empty());
    }

    #[test]
    fn test_issue_integrity_signals() {
        let mut deal = deal();
        deal.stage = LegalStage::TitleClearing;
        let now = deal.created_at;
        let issues = vec![
            DealIssue::record(
                deal.id,
                NewIssueInput {
                    title: "Lien on title".to_string(),
                    severity: IssueSeverity::Blocking,
                    discovered_at: Some(now - Duration::days(31)),
                },
            )
            .unwrap(),
            DealIssue::record(
                deal.id,
                NewIssueInput {
                    title: "Missing HOA letter".to_string(),
                    severity: IssueSeverity::Warning,
                    discovered_at: Some(now),
                },
            )
            .unwrap(),
        ];
        let metadata = DealMetadata::default();
        let snapshot = DealSnapshot {
            deal: &deal,
            events: &[],
            issues: &issues,
            metadata: &metadata,
        };
        assert_eq!(
            kinds(&evaluate_deal(snapshot, &AttentionThresholds::default(), now)),
            vec![
                SignalType::OpenBlockingIssues,
                SignalType::OldOpenIssues,
                SignalType::LateStageWithIssues,
            ]
        );

        deal.status = DealStatus::Closed;
        deal.stage = LegalStage::Closed;
        let snapshot = DealSnapshot {
            deal: &deal,
            events: &[],
            issues: &issues,
            metadata: &metadata,
        };
        let signals = kinds(&evaluate_deal(snapshot, &AttentionThresholds::default(), now));
        assert!(signals.contains(&SignalType::ClosedWithIssues));
        assert!(!signals.contains(&SignalType::LateStageWithIssues));
    }
}
