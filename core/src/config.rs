// Runtime configuration
//
// Base URLs and timeouts come from the deployment environment, never from code.

/// Engine configuration
#[derive(Clone, Debug)]
pub struct VigilConfig {
    /// Base URL for `api-endpoint` sources and the metrics backend
    pub api_base_url: String,
    /// Path of the metrics query endpoint, relative to `api_base_url`
    pub metrics_query_path: String,
    /// Per-request timeout for resolver calls
    pub request_timeout_ms: u64,
    pub user_agent: String,
    /// Realtime channel base URL; `None` disables the channel
    pub realtime_url: Option<String>,
    /// Path of the event stream, relative to `realtime_url`
    pub realtime_events_path: String,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            metrics_query_path: "/api/v1/query".to_string(),
            request_timeout_ms: 10_000,
            user_agent: "vigil/0.1".to_string(),
            realtime_url: None,
            realtime_events_path: "/events".to_string(),
        }
    }
}

impl VigilConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: env_non_empty("VIGIL_API_BASE_URL").unwrap_or(default.api_base_url),
            metrics_query_path: env_non_empty("VIGIL_METRICS_QUERY_PATH")
                .unwrap_or(default.metrics_query_path),
            request_timeout_ms: env_non_empty("VIGIL_REQUEST_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.request_timeout_ms),
            user_agent: default.user_agent,
            realtime_url: env_non_empty("VIGIL_REALTIME_URL"),
            realtime_events_path: env_non_empty("VIGIL_REALTIME_EVENTS_PATH")
                .unwrap_or(default.realtime_events_path),
        }
    }

    /// Whether the realtime channel can be established at all.
    pub fn realtime_enabled(&self) -> bool {
        self.realtime_url.is_some()
    }

    /// Full URL of the realtime event stream, if configured.
    pub fn realtime_events_url(&self) -> Option<String> {
        self.realtime_url
            .as_deref()
            .map(|base| join_url(base, &self.realtime_events_path))
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Join a base URL and a path with exactly one slash between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
