// User-facing notifications derived from alert events
//
// Uses a tokio broadcast channel so any number of toasters can listen.

use super::event::RealtimeEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewAlert,
    AlertResolved,
}

/// Notification shown to the user
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub urgency: Urgency,
    pub title: String,
    pub message: String,
    /// Alert identity, shared by the raise and resolve of one alert
    pub alert_name: String,
    pub service: String,
    pub severity: String,
    pub received_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_event(event: &RealtimeEvent) -> Self {
        let p = event.payload();
        let (kind, urgency, title) = match event {
            RealtimeEvent::NewAlert(_) => (
                NotificationKind::NewAlert,
                if p.is_critical() {
                    Urgency::High
                } else {
                    Urgency::Normal
                },
                format!("[{}] {} on {}", p.severity, p.alert_name, p.service),
            ),
            RealtimeEvent::AlertResolved(_) => (
                NotificationKind::AlertResolved,
                Urgency::Normal,
                format!("Resolved: {} on {}", p.alert_name, p.service),
            ),
        };

        Self {
            kind,
            urgency,
            title,
            message: p.message.clone(),
            alert_name: p.alert_name.clone(),
            service: p.service.clone(),
            severity: p.severity.clone(),
            received_at: Utc::now(),
        }
    }
}

/// Fan-out of notifications to every subscriber
#[derive(Clone)]
pub struct NotificationBroadcaster {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn broadcast(&self, notification: Notification) {
        // Ignore error if no subscribers
        let _ = self.sender.send(notification);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
