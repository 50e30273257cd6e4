// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bounded-channel notification sink. A delivery worker owns the receiving
//! end; the engine only ever `try_send`s.

use tokio::sync::mpsc;

use crate::domain::events::Notification;
use crate::domain::side_effects::{NotificationSink, SinkError};

#[derive(Clone)]
pub struct ChannelNotificationSink {
    sender: mpsc::Sender<Notification>,
}

impl ChannelNotificationSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn notify(&self, notification: Notification) -> Result<(), SinkError> {
        self.sender.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full { sink: "notification" },
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed { sink: "notification" },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::NotificationCategory;
    use crate::domain::identity::OrgId;

    fn notification() -> Notification {
        Notification {
            org_id: OrgId::new(),
            category: NotificationCategory::DealClosed,
            message: "Deal closed".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_full_and_closed_channels_error() {
        let (sink, mut receiver) = ChannelNotificationSink::channel(1);
        sink.notify(notification()).unwrap();
        assert!(matches!(sink.notify(notification()), Err(SinkError::Full { .. })));

        assert_eq!(receiver.recv().await.unwrap().message, "Deal closed");
        drop(receiver);
        assert!(matches!(sink.notify(notification()), Err(SinkError::Closed { .. })));
    }
}
