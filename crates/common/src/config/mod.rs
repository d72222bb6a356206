//! Configuration management for Scholar Assistant services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Legacy environment variables (SERPAPI_KEY, DASHSCOPE_API_KEY, REDIS_HOST, ...)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Upstream provider configuration
    pub providers: ProvidersConfig,

    /// Rate-limit retry configuration
    pub retry: RetryConfig,

    /// Search pipeline configuration
    pub search: SearchConfig,

    /// Graph endpoint configuration
    pub graph: GraphConfig,

    /// Log streaming configuration
    pub logstream: LogStreamConfig,

    /// Redis cache configuration (disabled unless enabled explicitly)
    pub cache: CacheSettings,

    /// Observability configuration
    pub observability: ObservabilityConfig,

    /// Inbound rate limiting configuration
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds. Graph requests can sit in backoff for
    /// several minutes, so this is deliberately generous.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub serpapi: SerpApiConfig,
    pub semantic_scholar: SemanticScholarConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerpApiConfig {
    /// SerpAPI key
    pub api_key: Option<String>,

    #[serde(default = "default_serpapi_base")]
    pub base_url: String,

    /// Search engine to query
    #[serde(default = "default_serpapi_engine")]
    pub engine: String,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SemanticScholarConfig {
    /// Optional API key for higher rate limits
    pub api_key: Option<String>,

    #[serde(default = "default_semantic_scholar_base")]
    pub base_url: String,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Keyword extraction provider: openai (any compatible endpoint), none
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key for the chat completion endpoint
    pub api_key: Option<String>,

    #[serde(default = "default_llm_base")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Attempts before giving up on a rate-limited graph fetch
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay; doubles on every rate-limited attempt
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,

    /// Pause after every non rate-limited response
    #[serde(default = "default_courtesy_delay")]
    pub courtesy_delay_ms: u64,

    /// Attempts for the per-result title lookup during search enrichment
    #[serde(default = "default_enrichment_attempts")]
    pub enrichment_max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,

    /// Upper bound on results requested from the search provider
    #[serde(default = "default_max_results_cap")]
    pub max_results_cap: usize,

    /// Concurrent metadata lookups while enriching one search
    #[serde(default = "default_enrichment_concurrency")]
    pub enrichment_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    #[serde(default = "default_max_nodes")]
    pub default_max_nodes: usize,

    /// Upper bound on the page size requested from the metadata provider
    #[serde(default = "default_max_nodes_cap")]
    pub max_nodes_cap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogStreamConfig {
    /// Idle time before the server pings a log client
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,

    /// Capacity of the queue between log producers and the broadcaster
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Longest a single client send may take before the client is dropped
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_redis_host")]
    pub host: String,

    #[serde(default = "default_redis_port")]
    pub port: u16,

    #[serde(default)]
    pub db: u32,

    /// Default TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Debug mode lowers the log level to debug
    #[serde(default)]
    pub debug: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second across the gateway
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 600 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_serpapi_base() -> String { "https://serpapi.com".to_string() }
fn default_serpapi_engine() -> String { "google_scholar".to_string() }
fn default_semantic_scholar_base() -> String { "https://api.semanticscholar.org/graph/v1".to_string() }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_base() -> String { "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string() }
fn default_llm_model() -> String { "qwen-plus-2025-07-28".to_string() }
fn default_llm_temperature() -> f32 { 0.3 }
fn default_llm_max_tokens() -> u32 { 100 }
fn default_provider_timeout() -> u64 { 30 }
fn default_max_attempts() -> u32 { 5 }
fn default_base_delay() -> u64 { 5 }
fn default_courtesy_delay() -> u64 { 500 }
fn default_enrichment_attempts() -> u32 { 2 }
fn default_max_results() -> usize { 50 }
fn default_max_results_cap() -> usize { 100 }
fn default_enrichment_concurrency() -> usize { 1 }
fn default_max_nodes() -> usize { 50 }
fn default_max_nodes_cap() -> usize { 100 }
fn default_keepalive() -> u64 { 30 }
fn default_queue_capacity() -> usize { 1024 }
fn default_send_timeout() -> u64 { 2_000 }
fn default_redis_host() -> String { "localhost".to_string() }
fn default_redis_port() -> u16 { 6379 }
fn default_cache_ttl() -> u64 { 86_400 }
fn default_key_prefix() -> String { "scholar".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

/// Environment variables understood for compatibility with older deployments
const LEGACY_ENV: &[(&str, &str)] = &[
    ("SERPAPI_KEY", "providers.serpapi.api_key"),
    ("DASHSCOPE_API_KEY", "providers.llm.api_key"),
    ("SEMANTIC_SCHOLAR_API_KEY", "providers.semantic_scholar.api_key"),
    ("REDIS_HOST", "cache.host"),
    ("REDIS_PORT", "cache.port"),
    ("REDIS_DB", "cache.db"),
    ("DEBUG", "observability.debug"),
];

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_ENV {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder.set_override_option(*key, value.map(|v| v.to_lowercase_if_bool()))?;
        }

        builder.build()?.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Effective log filter directive
    pub fn log_directive(&self) -> &str {
        if self.observability.debug {
            "debug"
        } else {
            &self.observability.log_level
        }
    }
}

impl CacheSettings {
    /// Redis connection URL built from host, port and database
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// "True"/"FALSE" style values from legacy env vars must parse as booleans
trait LowercaseIfBool {
    fn to_lowercase_if_bool(self) -> String;
}

impl LowercaseIfBool for String {
    fn to_lowercase_if_bool(self) -> String {
        let lowered = self.to_lowercase();
        if lowered == "true" || lowered == "false" {
            lowered
        } else {
            self
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for SerpApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_serpapi_base(),
            engine: default_serpapi_engine(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl Default for SemanticScholarConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_semantic_scholar_base(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            base_url: default_llm_base(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
            courtesy_delay_ms: default_courtesy_delay(),
            enrichment_max_attempts: default_enrichment_attempts(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            max_results_cap: default_max_results_cap(),
            enrichment_concurrency: default_enrichment_concurrency(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_max_nodes: default_max_nodes(),
            max_nodes_cap: default_max_nodes_cap(),
        }
    }
}

impl Default for LogStreamConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive(),
            queue_capacity: default_queue_capacity(),
            send_timeout_ms: default_send_timeout(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            default_ttl_secs: default_cache_ttl(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            debug: false,
            metrics_port: 0,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_secs, 5);
        assert_eq!(config.logstream.keepalive_secs, 30);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_cache_url() {
        let settings = CacheSettings {
            host: "redis.internal".into(),
            port: 6380,
            db: 2,
            ..CacheSettings::default()
        };
        assert_eq!(settings.url(), "redis://redis.internal:6380/2");
    }

    #[test]
    fn test_debug_lowers_log_level() {
        let mut config = AppConfig::default();
        assert_eq!(config.log_directive(), "info");
        config.observability.debug = true;
        assert_eq!(config.log_directive(), "debug");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("retry.max_attempts", 3)
            .unwrap()
            .set_override("server.port", 9000)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_secs, 5);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.search.max_results_cap, 100);
    }

    #[test]
    fn test_legacy_bool_values_are_normalized() {
        assert_eq!("True".to_string().to_lowercase_if_bool(), "true");
        assert_eq!("sk-ABC".to_string().to_lowercase_if_bool(), "sk-ABC");
    }
}
