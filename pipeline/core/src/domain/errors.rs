// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Lifecycle Error Taxonomy
//!
//! Every lifecycle operation returns its failure as a structured
//! [`LifecycleError`]; callers branch on [`LifecycleError::kind`] rather than
//! on message text.
//!
//! | Kind | Meaning |
//! |------|---------|
//! | `NotFound` | referenced entity absent |
//! | `Forbidden` | entity exists outside the caller's organization |
//! | `DuplicateLead` / `DuplicateDeal` | uniqueness violated, carries the conflicting id |
//! | `InvalidState` | operation not valid for the current status |
//! | `InvalidTransition` | status or stage graph violation, carries allowed set or blockers |
//! | `Validation` | malformed input |
//! | `Persistence` | the persistence gateway failed |
//!
//! Post-commit side-effect failures never appear here.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::deal::DealId;
use crate::domain::lead::{LeadId, LeadStatus};
use crate::domain::legal_stage::LegalStage;
use crate::domain::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Lead,
    Deal,
    Issue,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Lead => "lead",
            Self::Deal => "deal",
            Self::Issue => "issue",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    DuplicateLead,
    DuplicateDeal,
    InvalidState,
    InvalidTransition,
    Validation,
    Persistence,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: Uuid },

    #[error("{entity} {id} belongs to a different organization")]
    Forbidden { entity: EntityKind, id: Uuid },

    #[error("a lead for this property already exists: {existing_id}")]
    DuplicateLead { existing_id: LeadId },

    #[error("an in-progress deal already exists for this lead: {existing_id}")]
    DuplicateDeal { existing_id: DealId },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("cannot move lead from {from} to {to}; allowed: {allowed:?}")]
    InvalidStatusTransition {
        from: LeadStatus,
        to: LeadStatus,
        allowed: Vec<LeadStatus>,
    },

    #[error("cannot move deal from stage {from} to {to}: {}", blockers.join("; "))]
    StageTransitionBlocked {
        from: LegalStage,
        to: LegalStage,
        blockers: Vec<String>,
    },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(transparent)]
    Persistence(#[from] RepositoryError),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::DuplicateLead { .. } => ErrorKind::DuplicateLead,
            Self::DuplicateDeal { .. } => ErrorKind::DuplicateDeal,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::InvalidStatusTransition { .. } | Self::StageTransitionBlocked { .. } => {
                ErrorKind::InvalidTransition
            }
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    pub fn lead_not_found(id: LeadId) -> Self {
        Self::NotFound {
            entity: EntityKind::Lead,
            id: id.0,
        }
    }

    pub fn deal_not_found(id: DealId) -> Self {
        Self::NotFound {
            entity: EntityKind::Deal,
            id: id.0,
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
