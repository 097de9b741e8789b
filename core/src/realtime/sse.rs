// Server-Sent Events transport
//
// Lines end in LF, CRLF or a bare CR; a blank line ends a frame. Within a frame
// only the `event`, `data`, `id` and `retry` fields are meaningful; `:` starts a
// comment.

use super::transport::{EventStream, RawEvent, RealtimeError, RealtimeTransport};
use crate::config::VigilConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderName, ACCEPT, CACHE_CONTROL};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

/// Guard against a server that never terminates a frame
const MAX_SSE_BUFFER_BYTES: usize = 1024 * 1024;
const DEFAULT_EVENT_NAME: &str = "message";
const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, reqwest::Error>> + Send>>;

pub struct SseTransport {
    http_client: reqwest::Client,
}

impl SseTransport {
    pub fn new(connect_timeout: Duration, user_agent: &str) -> Self {
        // No overall timeout: the response body is the long-lived stream
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http_client }
    }

    pub fn from_config(config: &VigilConfig) -> Self {
        Self::new(
            Duration::from_millis(config.request_timeout_ms),
            &config.user_agent,
        )
    }
}

impl Default for SseTransport {
    fn default() -> Self {
        Self::from_config(&VigilConfig::default())
    }
}

#[async_trait]
impl RealtimeTransport for SseTransport {
    async fn connect(
        &self,
        url: &str,
        token: &str,
        last_event_id: Option<&str>,
    ) -> Result<EventStream, RealtimeError> {
        debug!(target: "realtime", url = %url, last_event_id = ?last_event_id, "Opening event stream");
        let mut request = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id {
            request = request.header(LAST_EVENT_ID, id);
        }
        let response = request
            .send()
            .await
            .map_err(|e| RealtimeError::Connect(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RealtimeError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            return Err(RealtimeError::Status(status.as_u16()));
        }

        let bytes: ByteStream = Box::pin(response.bytes_stream().map(|r| r.map(|b| b.to_vec())));
        Ok(Box::pin(SseStream {
            inner: bytes,
            buffer: Vec::new(),
            pending: VecDeque::new(),
        }))
    }
}

/// Decodes a byte stream into SSE events
struct SseStream {
    inner: ByteStream,
    buffer: Vec<u8>,
    pending: VecDeque<RawEvent>,
}

impl Stream for SseStream {
    type Item = Result<RawEvent, RealtimeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    this.buffer.extend_from_slice(&chunk);
                    while let Some(frame) = drain_next_frame(&mut this.buffer) {
                        match std::str::from_utf8(&frame) {
                            Ok(text) => this.pending.extend(parse_frame(text)),
                            Err(_) => warn!(target: "realtime", "Skipping non UTF-8 SSE frame"),
                        }
                    }
                    if this.buffer.len() > MAX_SSE_BUFFER_BYTES {
                        this.buffer.clear();
                        return Poll::Ready(Some(Err(RealtimeError::Stream(
                            "SSE frame exceeded maximum size".to_string(),
                        ))));
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(RealtimeError::Stream(e.to_string())))),
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Length of the line terminator at the start of `bytes`.
///
/// A CR as the last byte is held back: it may be the first half of a CRLF
/// split across chunks.
fn line_ending_len(bytes: &[u8]) -> Option<usize> {
    match bytes {
        [b'\r', b'\n', ..] => Some(2),
        [b'\r', _, ..] => Some(1),
        [b'\n', ..] => Some(1),
        _ => None,
    }
}

/// Start of the first blank line and the length of both terminators.
fn find_frame_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buffer.len() {
        match line_ending_len(&buffer[i..]) {
            Some(first) => {
                if let Some(second) = line_ending_len(&buffer[i + first..]) {
                    return Some((i, first + second));
                }
                i += first;
            }
            None => i += 1,
        }
    }
    None
}

fn drain_next_frame(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (pos, delim_len) = find_frame_boundary(buffer)?;
    let frame = buffer[..pos].to_vec();
    buffer.drain(..pos + delim_len);
    Some(frame)
}

/// Parse one frame; frames carrying no field at all yield `None`.
pub(crate) fn parse_frame(frame: &str) -> Option<RawEvent> {
    let mut event = RawEvent::default();
    let mut has_data = false;
    let mut seen = false;

    for line in frame.split(|c| c == '\n' || c == '\r') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => event.name = value.to_string(),
            "data" => {
                if has_data {
                    event.data.push('\n');
                }
                event.data.push_str(value);
                has_data = true;
            }
            "id" => event.id = Some(value.to_string()),
            "retry" => match value.parse::<u64>() {
                Ok(ms) => event.retry = Some(Duration::from_millis(ms)),
                Err(_) => continue,
            },
            _ => continue,
        }
        seen = true;
    }

    if !seen {
        return None;
    }
    if event.name.is_empty() {
        event.name = DEFAULT_EVENT_NAME.to_string();
    }
    Some(event)
}
