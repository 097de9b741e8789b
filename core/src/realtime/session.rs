// Realtime session
//
// One long-lived push connection. Notification dispatch and connection state
// updates pass through a gate; closing the gate is synchronous, so nothing is
// delivered once teardown has begun even if the socket takes longer to go away.

use super::event::RealtimeEvent;
use super::notify::{Notification, NotificationBroadcaster};
use super::transport::{RawEvent, RealtimeError, RealtimeTransport};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// SSE default reconnection delay until the server sends `retry:`
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct SessionGate {
    sink: Mutex<Option<NotificationBroadcaster>>,
    state: watch::Sender<ConnectionState>,
}

impl SessionGate {
    fn dispatch(&self, notification: Notification) -> bool {
        let sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        match sink.as_ref() {
            Some(sink) => {
                sink.broadcast(notification);
                true
            }
            None => false,
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        if sink.is_some() {
            self.state.send_replace(next);
        }
    }

    fn is_open(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn close(&self) {
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        *sink = None;
        self.state.send_replace(ConnectionState::Disconnected);
    }
}

/// One authenticated push connection and its reconnect loop
pub struct RealtimeSession {
    gate: Arc<SessionGate>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeSession {
    /// Spawn the connection loop. Must be called inside a tokio runtime.
    pub fn connect(
        url: String,
        token: String,
        transport: Arc<dyn RealtimeTransport>,
        sink: NotificationBroadcaster,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let gate = Arc::new(SessionGate {
            sink: Mutex::new(Some(sink)),
            state,
        });
        let task = tokio::spawn(run(url, token, transport, gate.clone()));
        Self {
            gate,
            task: Some(task),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.gate.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.gate.state.subscribe()
    }

    /// Stop dispatch immediately and abort the connection task.
    pub fn close(&mut self) {
        self.gate.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Like [`close`](Self::close), then wait until the connection is gone.
    pub async fn shutdown(mut self) {
        self.gate.close();
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        info!(target: "realtime", "Realtime session closed");
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run(
    url: String,
    token: String,
    transport: Arc<dyn RealtimeTransport>,
    gate: Arc<SessionGate>,
) {
    let mut reconnect_delay = DEFAULT_RECONNECT_DELAY;
    let mut last_event_id: Option<String> = None;

    while gate.is_open() {
        gate.set_state(ConnectionState::Connecting);
        match transport
            .connect(&url, &token, last_event_id.as_deref())
            .await
        {
            Ok(mut stream) => {
                gate.set_state(ConnectionState::Connected);
                info!(target: "realtime", url = %url, "Realtime channel connected");

                while let Some(item) = stream.next().await {
                    match item {
                        Ok(raw) => {
                            if let Some(delay) = raw.retry {
                                reconnect_delay = delay;
                            }
                            if let Some(id) = &raw.id {
                                // An empty id resets it
                                last_event_id = Some(id.clone()).filter(|id| !id.is_empty());
                            }
                            handle_event(&gate, raw);
                        }
                        Err(e) => {
                            warn!(target: "realtime", error = %e, "Realtime stream failed");
                            break;
                        }
                    }
                }
                info!(target: "realtime", "Realtime stream ended");
            }
            Err(RealtimeError::Unauthorized(status)) => {
                warn!(target: "realtime", status, "Realtime channel rejected token; not reconnecting");
                gate.set_state(ConnectionState::Disconnected);
                return;
            }
            Err(e) => {
                warn!(target: "realtime", error = %e, "Realtime connect failed");
            }
        }

        gate.set_state(ConnectionState::Disconnected);
        debug!(
            target: "realtime",
            delay_ms = reconnect_delay.as_millis() as u64,
            "Reconnecting realtime channel"
        );
        tokio::time::sleep(reconnect_delay).await;
    }
}

fn handle_event(gate: &SessionGate, raw: RawEvent) {
    match RealtimeEvent::parse(&raw.name, &raw.data) {
        Ok(Some(event)) => {
            let notification = Notification::from_event(&event);
            debug!(
                target: "realtime",
                alert = %notification.alert_name,
                urgency = ?notification.urgency,
                "Dispatching alert notification"
            );
            if !gate.dispatch(notification) {
                debug!(target: "realtime", "Session closed; notification dropped");
            }
        }
        Ok(None) => debug!(target: "realtime", event = %raw.name, "Ignoring unknown event"),
        Err(e) => warn!(target: "realtime", event = %raw.name, error = %e, "Malformed event payload"),
    }
}
