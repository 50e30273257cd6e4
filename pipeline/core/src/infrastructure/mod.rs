// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod event_bus;
pub mod notifications;
pub mod event_queue;
pub mod cache;
pub mod jurisdiction_provider;

pub use cache::InMemoryAggregateCache;
pub use event_bus::EventBus;
pub use event_queue::ChannelEventQueue;
pub use jurisdiction_provider::YamlJurisdictionProvider;
pub use notifications::ChannelNotificationSink;
pub use repositories::InMemoryPersistenceGateway;
