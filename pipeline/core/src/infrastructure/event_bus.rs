// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Realtime Event Bus - Pub/Sub for committed lifecycle changes
//
// In-memory fan-out using tokio broadcast channels. The transport that pushes
// messages to connected clients subscribes here; the engine never waits on it.
//
// Events are not persisted: a subscriber that lags loses the oldest messages.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::{RealtimeEvent, RealtimeMessage};
use crate::domain::identity::OrgId;
use crate::domain::side_effects::{RealtimeSink, SinkError};

/// Event bus for publishing and subscribing to realtime messages
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<RealtimeMessage>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many messages can be buffered before the oldest are dropped
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, message: RealtimeMessage) {
        debug!(org_id = %message.org_id, "Publishing realtime event: {:?}", message.event);

        // send() only fails when nobody is subscribed
        let receiver_count = self.sender.send(message).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to realtime event");
        }
    }

    /// Subscribe to every organization's messages
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to a single organization's messages
    pub fn subscribe_org(&self, org_id: OrgId) -> OrgEventReceiver {
        OrgEventReceiver {
            receiver: self.sender.subscribe(),
            org_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl RealtimeSink for EventBus {
    fn broadcast(&self, org_id: OrgId, event: RealtimeEvent) -> Result<(), SinkError> {
        self.publish(RealtimeMessage {
            org_id,
            event,
            emitted_at: Utc::now(),
        });
        Ok(())
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Realtime receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all realtime messages
pub struct EventReceiver {
    receiver: broadcast::Receiver<RealtimeMessage>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<RealtimeMessage, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive a message without blocking
    pub fn try_recv(&mut self) -> Result<RealtimeMessage, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Realtime receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one organization
pub struct OrgEventReceiver {
    receiver: broadcast::Receiver<RealtimeMessage>,
    org_id: OrgId,
}

impl OrgEventReceiver {
    pub async fn recv(&mut self) -> Result<RealtimeMessage, EventBusError> {
        loop {
            let message = self.receiver.recv().await.map_err(map_recv_error)?;
            if message.org_id == self.org_id {
                return Ok(message);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
