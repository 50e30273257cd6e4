// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Dealflow CLI

pub mod attention;
pub mod config;
pub mod rules;
pub mod stage;

pub use self::attention::AttentionArgs;
pub use self::config::ConfigCommand;
pub use self::rules::RulesCommand;
pub use self::stage::StageCommand;
