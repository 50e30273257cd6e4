// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Aggregates, pure state machines and collaborator contracts of the
//! lifecycle engine.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Lead, deal and legal-stage rules with no I/O

pub mod identity;
pub mod patch;
pub mod underwriting;
pub mod errors;
pub mod lead;
pub mod deal;
pub mod legal_stage;
pub mod metadata;
pub mod jurisdiction;
pub mod issue;
pub mod events;
pub mod automation;
pub mod attention;
pub mod side_effects;
pub mod repository;
pub mod engine_config;
