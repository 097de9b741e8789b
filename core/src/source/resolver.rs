/// Data Source Resolver
///
/// Turns a descriptor into data with exactly one attempt. Inline values never
/// touch the network; metric queries and API endpoints issue a single GET.
use super::descriptor::{DataSourceDescriptor, SourcePlan};
use super::error::{FetchError, FetchResult};
use crate::config::{join_url, VigilConfig};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Longest slice of an upstream error body kept in the error message
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Outcome of a successful resolve
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Payload handed through to the block renderer
    Data(Value),
    /// The source kind has nothing to bind; the block renders nothing
    Nothing,
}

/// Resolves descriptors into data; single attempt, no retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, descriptor: &DataSourceDescriptor) -> FetchResult<Resolution>;
}

/// Resolver backed by the metrics backend and the generic API over HTTP
pub struct HttpResolver {
    http_client: reqwest::Client,
    api_base_url: String,
    metrics_query_path: String,
    bearer_token: Option<String>,
}

impl HttpResolver {
    pub fn new(config: &VigilConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http_client,
            api_base_url: config.api_base_url.clone(),
            metrics_query_path: config.metrics_query_path.clone(),
            bearer_token: None,
        }
    }

    /// Attach a bearer token to every outgoing request
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            join_url(&self.api_base_url, endpoint)
        }
    }

    async fn query_metric(&self, query: &str, extra: &Map<String, Value>) -> FetchResult<Value> {
        let url = join_url(&self.api_base_url, &self.metrics_query_path);
        let mut params: Vec<(String, String)> = vec![("query".to_string(), query.to_string())];
        params.extend(
            extra
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), query_value(v))),
        );

        debug!(target: "resolver", url = %url, query = %query, "Querying metrics backend");
        self.get_json(self.http_client.get(&url).query(&params), &url)
            .await
    }

    async fn fetch_endpoint(&self, endpoint: &str) -> FetchResult<Value> {
        let url = self.endpoint_url(endpoint);
        debug!(target: "resolver", url = %url, "Fetching API endpoint");
        self.get_json(self.http_client.get(&url), &url).await
    }

    async fn get_json(&self, request: reqwest::RequestBuilder, url: &str) -> FetchResult<Value> {
        let request = match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            warn!(target: "resolver", url = %url, error = %e, "Request failed");
            FetchError::Transport(format!("request to {} failed: {}", url, e))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            warn!(target: "resolver", url = %url, error = %e, "Failed reading response body");
            FetchError::Transport(format!("reading response from {} failed: {}", url, e))
        })?;

        if !status.is_success() {
            warn!(target: "resolver", url = %url, status = %status, "Upstream returned error");
            return Err(FetchError::Upstream {
                status: Some(status.as_u16()),
                message: format!("{} returned {}: {}", url, status, body_preview(&body)),
            });
        }

        serde_json::from_slice(&body).map_err(|e| {
            warn!(target: "resolver", url = %url, error = %e, "Failed to parse response body");
            FetchError::Upstream {
                status: Some(status.as_u16()),
                message: format!("unparsable body from {}: {}", url, e),
            }
        })
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn resolve(&self, descriptor: &DataSourceDescriptor) -> FetchResult<Resolution> {
        match descriptor.plan()? {
            SourcePlan::Inline(value) => Ok(Resolution::Data(value.clone())),
            SourcePlan::MetricQuery { query, extra } => {
                self.query_metric(query, extra).await.map(Resolution::Data)
            }
            SourcePlan::Endpoint(endpoint) => {
                self.fetch_endpoint(endpoint).await.map(Resolution::Data)
            }
            SourcePlan::Nothing => {
                debug!(target: "resolver", "Unknown source kind; nothing to resolve");
                Ok(Resolution::Nothing)
            }
        }
    }
}

fn query_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn body_preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut preview: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    if text.chars().count() > MAX_ERROR_BODY_CHARS {
        preview.push_str("...");
    }
    preview
}
