use async_trait::async_trait;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::Stream;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    /// The server rejected the token; reconnecting with it is pointless
    #[error("Unauthorized: server answered {0}")]
    Unauthorized(u16),

    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// One named event as delivered by the transport
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub name: String,
    pub data: String,
    pub id: Option<String>,
    /// Reconnect delay requested by the server
    pub retry: Option<Duration>,
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<RawEvent, RealtimeError>> + Send>>;

/// Opens one authenticated push connection.
///
/// `last_event_id` is the id of the last event seen on a previous connection
/// of the same session, so the server can replay what was missed. Dropping
/// the returned stream closes the connection.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        token: &str,
        last_event_id: Option<&str>,
    ) -> Result<EventStream, RealtimeError>;
}
