// Realtime coordinator
//
// Single owner of the realtime session for the whole process. A session exists
// only while both an events URL and an auth token are known; any token change
// replaces it.

use super::notify::{Notification, NotificationBroadcaster};
use super::session::{ConnectionState, RealtimeSession};
use super::sse::SseTransport;
use super::transport::RealtimeTransport;
use crate::config::VigilConfig;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info};

struct ActiveSession {
    token: String,
    session: RealtimeSession,
}

pub struct RealtimeCoordinator {
    events_url: Option<String>,
    transport: Arc<dyn RealtimeTransport>,
    notifications: NotificationBroadcaster,
    active: Mutex<Option<ActiveSession>>,
}

impl RealtimeCoordinator {
    pub fn new(events_url: Option<String>, transport: Arc<dyn RealtimeTransport>) -> Self {
        Self {
            events_url,
            transport,
            notifications: NotificationBroadcaster::default(),
            active: Mutex::new(None),
        }
    }

    /// Coordinator over SSE, configured from `config`.
    pub fn from_config(config: &VigilConfig) -> Self {
        let transport = SseTransport::from_config(config);
        Self::new(config.realtime_events_url(), Arc::new(transport))
    }

    pub fn is_enabled(&self) -> bool {
        self.events_url.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Apply the current auth token.
    ///
    /// Same token: nothing happens. Changed or cleared token: the existing
    /// session is shut down first. A new session starts only when a token is
    /// present and the channel is configured.
    pub async fn set_token(&self, token: Option<String>) {
        let token = token.filter(|t| !t.trim().is_empty());
        let mut active = self.active.lock().await;

        if active.as_ref().map(|a| a.token.as_str()) == token.as_deref() {
            return;
        }

        if let Some(previous) = active.take() {
            previous.session.shutdown().await;
        }

        match (&self.events_url, token) {
            (Some(url), Some(token)) => {
                info!(target: "realtime", url = %url, "Starting realtime session");
                let session = RealtimeSession::connect(
                    url.clone(),
                    token.clone(),
                    self.transport.clone(),
                    self.notifications.clone(),
                );
                *active = Some(ActiveSession { token, session });
            }
            (None, Some(_)) => {
                debug!(target: "realtime", "Realtime URL not configured; channel disabled");
            }
            (_, None) => {
                debug!(target: "realtime", "No auth token; realtime channel idle");
            }
        }
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| a.session.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub async fn watch_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| a.session.watch_state())
    }

    pub async fn shutdown(&self) {
        self.set_token(None).await;
    }
}
