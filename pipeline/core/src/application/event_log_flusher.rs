// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Event Log Flusher Application Service
//!
//! Drains the asynchronous event queue (automation audit records) and appends
//! the records to the persistence gateway's event log in batches.
//!
//! - Coordinates the event queue receiver and the persistence gateway
//! - No business logic
//! - Never panics; a failed batch is logged and dropped

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::events::DomainEventRecord;
use crate::domain::repository::PersistenceGateway;

/// Counters reported when the flusher shuts down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub events_flushed: u64,
    pub events_dropped: u64,
    pub batches_failed: u64,
}

pub struct EventLogFlusher {
    gateway: Arc<dyn PersistenceGateway>,
    batch_size: usize,
}

impl EventLogFlusher {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, batch_size: usize) -> Self {
        Self {
            gateway,
            batch_size: batch_size.max(1),
        }
    }

    /// Start the background flush task
    ///
    /// The task runs until every sender of the queue has been dropped and the
    /// remaining records are flushed. The handle resolves to the final counters.
    pub fn start(self: Arc<Self>, mut receiver: mpsc::Receiver<DomainEventRecord>) -> JoinHandle<FlushStats> {
        info!(batch_size = self.batch_size, "Starting event log flusher background task");

        tokio::spawn(async move {
            let mut stats = FlushStats::default();
            let mut batch = Vec::with_capacity(self.batch_size);

            loop {
                let received = receiver.recv_many(&mut batch, self.batch_size).await;
                if received == 0 {
                    // Channel closed and drained
                    break;
                }

                let count = batch.len() as u64;
                match self.gateway.append_events(std::mem::take(&mut batch)).await {
                    Ok(()) => {
                        stats.events_flushed += count;
                        debug!(count, total = stats.events_flushed, "Flushed event batch");
                    }
                    Err(e) => {
                        stats.batches_failed += 1;
                        stats.events_dropped += count;
                        error!(error = %e, count, "Failed to append event batch to log");

                        // Log warning every 10 failures to avoid spam
                        if stats.batches_failed % 10 == 0 {
                            warn!("Event log flush has failed {} times", stats.batches_failed);
                        }
                    }
                }
            }

            info!(
                "Event log flusher shut down gracefully \
                 (flushed {} events, dropped {})",
                stats.events_flushed, stats.events_dropped
            );
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventType;
    use crate::domain::identity::OrgId;
    use crate::infrastructure::repositories::InMemoryPersistenceGateway;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_flusher_drains_queue_on_shutdown() {
        let gateway = InMemoryPersistenceGateway::new();
        let flusher = Arc::new(EventLogFlusher::new(Arc::new(gateway.clone()), 2));
        let (sender, receiver) = mpsc::channel(16);

        let subject = Uuid::new_v4();
        for _ in 0..5 {
            sender
                .send(DomainEventRecord::new(
                    OrgId::new(),
                    subject,
                    EventType::NoteAdded,
                    serde_json::Value::Null,
                ))
                .await
                .unwrap();
        }

        let handle = flusher.start(receiver);
        drop(sender);
        let stats = handle.await.unwrap();

        assert_eq!(stats.events_flushed, 5);
        assert_eq!(stats.batches_failed, 0);
        assert_eq!(gateway.list_events(subject).await.unwrap().len(), 5);
    }
}
