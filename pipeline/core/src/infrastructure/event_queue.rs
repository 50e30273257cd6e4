// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bounded-channel event queue drained by the event-log flusher.

use tokio::sync::mpsc;

use crate::domain::events::DomainEventRecord;
use crate::domain::side_effects::{EventQueue, SinkError};

#[derive(Clone)]
pub struct ChannelEventQueue {
    sender: mpsc::Sender<DomainEventRecord>,
}

impl ChannelEventQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DomainEventRecord>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl EventQueue for ChannelEventQueue {
    fn enqueue(&self, record: DomainEventRecord) -> Result<(), SinkError> {
        self.sender.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full { sink: "event_queue" },
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed { sink: "event_queue" },
        })
    }
}
