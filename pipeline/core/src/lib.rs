// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Dealflow Core
//!
//! Domain lifecycle engine for real-estate acquisition leads, deals and legal
//! closings.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Lifecycle services, automation and needs-attention scanning

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
