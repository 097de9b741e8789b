// Realtime module - push channel for alert lifecycle events
//
// Runs beside the block bindings and never waits on them.

mod coordinator;
mod event;
mod notify;
mod session;
mod sse;
mod transport;

pub use coordinator::RealtimeCoordinator;
pub use event::{AlertPayload, RealtimeEvent, ALERT_RESOLVED, NEW_ALERT};
pub use notify::{Notification, NotificationBroadcaster, NotificationKind, Urgency};
pub use session::{ConnectionState, RealtimeSession, DEFAULT_RECONNECT_DELAY};
pub use sse::SseTransport;
pub use transport::{EventStream, RawEvent, RealtimeError, RealtimeTransport};
