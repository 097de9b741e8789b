//! Shared test resolvers and transports
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use vigil_core::realtime::{EventStream, RawEvent, RealtimeError, RealtimeTransport};
use vigil_core::source::{DataSourceDescriptor, FetchResult, Resolution, Resolver};

/// Answers immediately with the call number as data
#[derive(Default)]
pub struct CountingResolver {
    calls: AtomicUsize,
}

impl CountingResolver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for CountingResolver {
    async fn resolve(&self, _descriptor: &DataSourceDescriptor) -> FetchResult<Resolution> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Resolution::Data(json!(n)))
    }
}

/// Plays back (delay, outcome) steps in call order; pends forever once exhausted
pub struct ScriptedResolver {
    calls: AtomicUsize,
    script: Mutex<VecDeque<(Duration, FetchResult<Resolution>)>>,
}

impl ScriptedResolver {
    pub fn new(steps: Vec<(Duration, FetchResult<Resolution>)>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(steps.into()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve(&self, _descriptor: &DataSourceDescriptor) -> FetchResult<Resolution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some((delay, outcome)) => {
                tokio::time::sleep(delay).await;
                outcome
            }
            None => std::future::pending().await,
        }
    }
}

pub fn data(v: serde_json::Value) -> FetchResult<Resolution> {
    Ok(Resolution::Data(v))
}

pub type EventSender = mpsc::UnboundedSender<Result<RawEvent, RealtimeError>>;

/// In-memory transport; each connect opens a channel the test can feed
#[derive(Default)]
pub struct ChannelTransport {
    tokens: Mutex<Vec<String>>,
    last_event_ids: Mutex<Vec<Option<String>>>,
    senders: Mutex<Vec<EventSender>>,
    reject_with: Option<u16>,
}

impl ChannelTransport {
    pub fn rejecting(status: u16) -> Self {
        Self {
            reject_with: Some(status),
            ..Self::default()
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    /// `Last-Event-ID` passed on each connect, in order
    pub fn last_event_ids(&self) -> Vec<Option<String>> {
        self.last_event_ids.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    /// Sender of the n-th connection
    pub fn sender(&self, n: usize) -> EventSender {
        self.senders.lock().unwrap()[n].clone()
    }

    /// Drop the transport's own handle to the n-th connection
    pub fn forget(&self, n: usize) -> EventSender {
        let mut senders = self.senders.lock().unwrap();
        let (tx, _) = mpsc::unbounded_channel();
        std::mem::replace(&mut senders[n], tx)
    }
}

#[async_trait]
impl RealtimeTransport for ChannelTransport {
    async fn connect(
        &self,
        _url: &str,
        token: &str,
        last_event_id: Option<&str>,
    ) -> Result<EventStream, RealtimeError> {
        self.tokens.lock().unwrap().push(token.to_string());
        self.last_event_ids
            .lock()
            .unwrap()
            .push(last_event_id.map(str::to_string));
        if let Some(status) = self.reject_with {
            return Err(RealtimeError::Unauthorized(status));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

pub fn alert_event(name: &str, severity: &str) -> RawEvent {
    RawEvent {
        name: name.to_string(),
        data: json!({
            "service": "payments",
            "severity": severity,
            "message": "error budget burning",
            "alertName": "PaymentsErrorRate",
        })
        .to_string(),
        id: None,
        retry: None,
    }
}

pub fn shared<T>(t: T) -> Arc<T> {
    Arc::new(t)
}
