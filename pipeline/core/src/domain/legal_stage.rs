// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Legal Stage State Machine
//!
//! The closing-process phase of a deal, stored on the deal record but owned by
//! the legal-stage service. Stages follow a canonical order from
//! `PRE_CONTRACT` to `CLOSED`, plus a terminal `DEAD` stage reachable from any
//! non-terminal stage.
//!
//! Structural rules (see [`validate_stage_transition`]):
//!
//! 1. No transition out of `CLOSED` or `DEAD`.
//! 2. A transition to the current stage is an error, not a silent no-op.
//! 3. A cancelled deal cannot move.
//! 4. Everything else is accepted; backwards moves are tagged as rollbacks
//!    and recorded, never blocked here.

use serde::{Deserialize, Serialize};

use crate::domain::deal::{Deal, DealStatus};
use crate::domain::errors::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegalStage {
    PreContract,
    UnderContract,
    Assigned,
    TitleClearing,
    ClearedToClose,
    Closed,
    Dead,
}

impl LegalStage {
    /// Canonical order, excluding `Dead`
    pub const ORDERED: [LegalStage; 6] = [
        Self::PreContract,
        Self::UnderContract,
        Self::Assigned,
        Self::TitleClearing,
        Self::ClearedToClose,
        Self::Closed,
    ];

    pub const ALL: [LegalStage; 7] = [
        Self::PreContract,
        Self::UnderContract,
        Self::Assigned,
        Self::TitleClearing,
        Self::ClearedToClose,
        Self::Closed,
        Self::Dead,
    ];

    /// Position in the canonical order. `Dead` sorts after every stage.
    pub fn position(&self) -> usize {
        Self::ORDERED
            .iter()
            .position(|stage| stage == self)
            .unwrap_or(Self::ORDERED.len())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Dead)
    }

    /// Stages where open blocking issues are an escalation
    pub fn is_late(&self) -> bool {
        matches!(self, Self::Assigned | Self::TitleClearing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreContract => "PRE_CONTRACT",
            Self::UnderContract => "UNDER_CONTRACT",
            Self::Assigned => "ASSIGNED",
            Self::TitleClearing => "TITLE_CLEARING",
            Self::ClearedToClose => "CLEARED_TO_CLOSE",
            Self::Closed => "CLOSED",
            Self::Dead => "DEAD",
        }
    }
}

impl Default for LegalStage {
    fn default() -> Self {
        Self::PreContract
    }
}

impl std::fmt::Display for LegalStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LegalStage {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| LifecycleError::validation("stage", format!("unknown legal stage '{}'", s)))
    }
}

/// Accepted structural transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransitionCheck {
    pub from: LegalStage,
    pub to: LegalStage,
    pub is_rollback: bool,
}

/// Why a structural transition was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StageRejection {
    TerminalStage { stage: LegalStage },
    SameStage { stage: LegalStage },
    DealCancelled,
}

impl std::fmt::Display for StageRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TerminalStage { stage } => {
                write!(f, "stage {} is terminal; no further transitions are allowed", stage)
            }
            Self::SameStage { stage } => write!(f, "deal is already in stage {}", stage),
            Self::DealCancelled => f.write_str("deal is cancelled"),
        }
    }
}

/// Pure structural validation of a stage move for `deal`
pub fn validate_stage_transition(
    deal: &Deal,
    target: LegalStage,
) -> Result<StageTransitionCheck, StageRejection> {
    let current = deal.stage;
    if current.is_terminal() {
        return Err(StageRejection::TerminalStage { stage: current });
    }
    if target == current {
        return Err(StageRejection::SameStage { stage: current });
    }
    if deal.status == DealStatus::Cancelled {
        return Err(StageRejection::DealCancelled);
    }
    Ok(StageTransitionCheck {
        from: current,
        to: target,
        is_rollback: target.position() < current.position(),
    })
}
