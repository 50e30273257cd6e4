// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deal issues: problems discovered during closing (title defects, missing
//! documents). Read by the needs-attention aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::deal::DealId;
use crate::domain::errors::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueId(pub Uuid);

impl IssueId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IssueId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for IssueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    Blocking,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIssueInput {
    pub title: String,
    pub severity: IssueSeverity,
    /// Backdated discovery time, defaults to now
    #[serde(default)]
    pub discovered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealIssue {
    pub id: IssueId,
    pub deal_id: DealId,
    pub title: String,
    pub severity: IssueSeverity,
    pub status: IssueStatus,
    pub discovered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DealIssue {
    pub fn record(deal_id: DealId, input: NewIssueInput) -> Result<Self, LifecycleError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(LifecycleError::validation("title", "must not be empty"));
        }
        Ok(Self {
            id: IssueId::new(),
            deal_id,
            title: title.to_string(),
            severity: input.severity,
            status: IssueStatus::Open,
            discovered_at: input.discovered_at.unwrap_or_else(Utc::now),
            resolved_at: None,
        })
    }

    pub fn resolve(&mut self, at: DateTime<Utc>) -> Result<(), LifecycleError> {
        if self.status == IssueStatus::Resolved {
            return Err(LifecycleError::InvalidState(format!(
                "issue {} is already resolved",
                self.id
            )));
        }
        self.status = IssueStatus::Resolved;
        self.resolved_at = Some(at);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.status == IssueStatus::Open
    }

    pub fn is_open_blocking(&self) -> bool {
        self.is_open() && self.severity == IssueSeverity::Blocking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;

    #[test]
    fn test_resolve_twice_is_invalid_state() {
        let mut issue = DealIssue::record(
            DealId::new(),
            NewIssueInput {
                title: "Unreleased lien".to_string(),
                severity: IssueSeverity::Blocking,
                discovered_at: None,
            },
        )
        .unwrap();
        assert!(issue.is_open_blocking());

        issue.resolve(Utc::now()).unwrap();
        assert!(!issue.is_open());
        assert_eq!(issue.resolve(Utc::now()).unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_blank_title_rejected() {
        let err = DealIssue::record(
            DealId::new(),
            NewIssueInput {
                title: "  ".to_string(),
                severity: IssueSeverity::Info,
                discovered_at: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
