// Declarative data source descriptors
//
// A descriptor says where a block's data comes from. Validation happens here,
// before any I/O, so malformed descriptors fail fast.

use super::error::{FetchError, FetchResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Kind of data source, carried in the `type` field.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Inline value embedded in the descriptor
    Static,
    /// Query against the metrics backend
    QueryMetric,
    /// Plain GET against an API endpoint
    ApiEndpoint,
    /// Any kind this engine does not know; resolves to nothing
    #[serde(other)]
    Unknown,
}

impl SourceKind {
    /// Name of the `params` field this kind cannot do without.
    pub fn required_param(&self) -> Option<&'static str> {
        match self {
            SourceKind::Static => Some("value"),
            SourceKind::QueryMetric => Some("query"),
            SourceKind::ApiEndpoint => Some("endpoint"),
            SourceKind::Unknown => None,
        }
    }
}

/// Kind-specific payload.
///
/// Keys beyond the known ones are kept in `extra`; for metric queries they are
/// forwarded to the backend as additional query parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Where a block's data comes from and how often to refresh it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceDescriptor {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(default)]
    pub params: SourceParams,
    /// `0` or absent: fetch once, never re-poll
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval_seconds: Option<u64>,
}

/// A validated descriptor, borrowed, ready for a resolver to act on.
#[derive(Debug, PartialEq)]
pub enum SourcePlan<'a> {
    Inline(&'a Value),
    MetricQuery {
        query: &'a str,
        extra: &'a Map<String, Value>,
    },
    Endpoint(&'a str),
    Nothing,
}

impl DataSourceDescriptor {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            params: SourceParams::default(),
            refresh_interval_seconds: None,
        }
    }

    pub fn inline(value: Value) -> Self {
        let mut desc = Self::new(SourceKind::Static);
        desc.params.value = Some(value);
        desc
    }

    pub fn metric(query: impl Into<String>) -> Self {
        let mut desc = Self::new(SourceKind::QueryMetric);
        desc.params.query = Some(query.into());
        desc
    }

    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        let mut desc = Self::new(SourceKind::ApiEndpoint);
        desc.params.endpoint = Some(endpoint.into());
        desc
    }

    pub fn with_refresh_interval(mut self, seconds: u64) -> Self {
        self.refresh_interval_seconds = Some(seconds);
        self
    }

    /// Refresh period, or `None` when the source is fetched only once.
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.refresh_interval_seconds {
            Some(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }

    /// Check the kind's required field and borrow what the resolver needs.
    pub fn plan(&self) -> FetchResult<SourcePlan<'_>> {
        match self.kind {
            SourceKind::Static => self
                .params
                .value
                .as_ref()
                .map(SourcePlan::Inline)
                .ok_or_else(|| missing(&self.kind)),
            SourceKind::QueryMetric => {
                let query = non_blank(self.params.query.as_deref()).ok_or_else(|| missing(&self.kind))?;
                Ok(SourcePlan::MetricQuery {
                    query,
                    extra: &self.params.extra,
                })
            }
            SourceKind::ApiEndpoint => non_blank(self.params.endpoint.as_deref())
                .map(SourcePlan::Endpoint)
                .ok_or_else(|| missing(&self.kind)),
            SourceKind::Unknown => Ok(SourcePlan::Nothing),
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn missing(kind: &SourceKind) -> FetchError {
    let field = kind.required_param().unwrap_or("params");
    FetchError::Configuration(format!("{:?} source requires params.{}", kind, field))
}
