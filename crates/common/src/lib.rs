//! Scholar Assistant Common Library
//!
//! Shared code for the Scholar Assistant services including:
//! - Paper and graph data models
//! - Upstream provider clients (search, metadata, keyword extraction)
//! - Rate-limit aware retry executor
//! - Error types and handling
//! - Configuration management
//! - Optional Redis cache
//! - Metrics and observability

pub mod cache;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod providers;
pub mod retry;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::{EdgeKind, Graph, GraphEdge, GraphNode, LogMessage, NodeKind, PaperRecord};
pub use retry::{Fetched, RetryExecutor, RetryPolicy};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent to every upstream provider
pub const USER_AGENT: &str = concat!("ScholarAssistant/", env!("CARGO_PKG_VERSION"));
