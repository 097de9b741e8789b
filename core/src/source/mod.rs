/// Data source descriptors and their resolvers
pub mod descriptor;
pub mod error;
pub mod resolver;

// Re-export common types
pub use descriptor::{DataSourceDescriptor, SourceKind, SourceParams, SourcePlan};
pub use error::{FetchError, FetchResult};
pub use resolver::{HttpResolver, Resolution, Resolver};

#[cfg(test)]
pub use resolver::MockResolver;
