// Vigil Core Library
// Dashboard block data binding, refresh scheduling and realtime alert delivery

pub mod binding;
pub mod config;
pub mod dashboard;
pub mod realtime;
pub mod source;
pub mod telemetry;

// Export core types
pub use binding::{BindingState, BlockBinding, RefreshScheduler};
pub use config::VigilConfig;
pub use dashboard::{BlockDescriptor, Dashboard, DashboardDefinition};
pub use realtime::{
    ConnectionState, Notification, NotificationBroadcaster, RealtimeCoordinator, Urgency,
};
pub use source::{DataSourceDescriptor, FetchError, HttpResolver, Resolution, Resolver, SourceKind};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Dashboard error: {0}")]
    DashboardError(String),

    #[error("Realtime error: {0}")]
    RealtimeError(String),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, VigilError>;
