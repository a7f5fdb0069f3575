//! Outgoing notifications.
//!
//! Components that announce changes receive a `MessageSink` instead of
//! reaching for a global socket server, so tests can swap in a channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::ReminderChannel;

/// Engine → subscriber messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    /// Weekly template or an exception changed; cached slots were dropped.
    AvailabilityChanged { therapist_id: String, version: i64 },
    EventCreated {
        user_id: String,
        event_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    EventUpdated {
        user_id: String,
        event_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// A reminder was handed to its delivery channel.
    ReminderDue {
        reminder_id: String,
        appointment_id: String,
        user_id: String,
        channel: ReminderChannel,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::AvailabilityChanged { .. } => "AvailabilityChanged",
            Notification::EventCreated { .. } => "EventCreated",
            Notification::EventUpdated { .. } => "EventUpdated",
            Notification::ReminderDue { .. } => "ReminderDue",
        }
    }
}

/// Fire-and-forget publisher. Implementations must not block the caller.
pub trait MessageSink: Send + Sync {
    fn publish(&self, notification: Notification);
}

/// Logs each notification. Used when nothing subscribes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn publish(&self, notification: Notification) {
        tracing::info!(kind = notification.kind(), ?notification, "Notification published");
    }
}

/// Forwards notifications into a bounded tokio channel.
/// A full or closed channel drops the message with a warning.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Notification>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    fn publish(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => (),
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(kind = dropped.kind(), "Notification channel full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                tracing::warn!(kind = dropped.kind(), "Notification channel closed, dropping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(version: i64) -> Notification {
        Notification::AvailabilityChanged {
            therapist_id: "t-1".into(),
            version,
        }
    }

    #[test]
    fn channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.publish(changed(1));
        sink.publish(changed(2));
        assert_eq!(rx.try_recv().unwrap(), changed(1));
        assert_eq!(rx.try_recv().unwrap(), changed(2));
    }

    #[test]
    fn full_channel_drops_without_blocking() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.publish(changed(1));
        sink.publish(changed(2));
        assert_eq!(rx.try_recv().unwrap(), changed(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        sink.publish(changed(1));
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(changed(3)).unwrap();
        assert_eq!(json["type"], "AvailabilityChanged");
        assert_eq!(json["version"], 3);
    }
}
