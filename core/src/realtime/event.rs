// Alert lifecycle events pushed by the realtime channel

use serde::{Deserialize, Serialize};

pub const NEW_ALERT: &str = "new_alert";
pub const ALERT_RESOLVED: &str = "alert_resolved";

/// Payload shared by both alert events
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub alert_name: String,
}

impl AlertPayload {
    pub fn is_critical(&self) -> bool {
        self.severity.trim().eq_ignore_ascii_case("critical")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RealtimeEvent {
    NewAlert(AlertPayload),
    AlertResolved(AlertPayload),
}

impl RealtimeEvent {
    /// Decode a named event. Unrecognised names yield `Ok(None)`.
    pub fn parse(name: &str, data: &str) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            NEW_ALERT => RealtimeEvent::NewAlert(serde_json::from_str(data)?),
            ALERT_RESOLVED => RealtimeEvent::AlertResolved(serde_json::from_str(data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    pub fn payload(&self) -> &AlertPayload {
        match self {
            RealtimeEvent::NewAlert(p) | RealtimeEvent::AlertResolved(p) => p,
        }
    }
}
