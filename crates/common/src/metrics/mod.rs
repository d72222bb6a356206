//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Scholar Assistant metrics
pub const METRICS_PREFIX: &str = "scholar";

/// Histogram buckets for request latency (in seconds). Graph requests may
/// spend minutes in rate-limit backoff, hence the long tail.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    155.0,  // full backoff schedule
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Upstream metrics
    describe_counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Requests sent to upstream providers"
    );

    describe_histogram!(
        format!("{}_upstream_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Upstream provider latency in seconds"
    );

    describe_counter!(
        format!("{}_upstream_rate_limited_total", METRICS_PREFIX),
        Unit::Count,
        "Upstream responses that signalled rate limiting"
    );

    describe_counter!(
        format!("{}_upstream_retries_exhausted_total", METRICS_PREFIX),
        Unit::Count,
        "Calls that gave up after repeated rate limiting"
    );

    // Search metrics
    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search pipeline latency in seconds"
    );

    describe_gauge!(
        format!("{}_search_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of results returned from the last search"
    );

    describe_counter!(
        format!("{}_enrichment_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Search hits dropped for lack of a canonical id"
    );

    describe_counter!(
        format!("{}_keyword_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Searches that kept the original query after keyword extraction failed"
    );

    // Graph metrics
    describe_counter!(
        format!("{}_graph_nodes_total", METRICS_PREFIX),
        Unit::Count,
        "Graph nodes produced by normalization"
    );

    // Log streaming metrics
    describe_gauge!(
        format!("{}_log_connections_active", METRICS_PREFIX),
        Unit::Count,
        "Connected log streaming clients"
    );

    describe_counter!(
        format!("{}_log_messages_sent_total", METRICS_PREFIX),
        Unit::Count,
        "Log messages delivered to clients"
    );

    describe_counter!(
        format!("{}_log_connections_pruned_total", METRICS_PREFIX),
        Unit::Count,
        "Log clients removed after a failed send"
    );

    describe_counter!(
        format!("{}_log_lines_dropped_total", METRICS_PREFIX),
        Unit::Count,
        "Log lines dropped because the broadcast queue was full"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record one upstream round trip
pub fn record_upstream_request(service: &str, status: u16, duration_secs: f64) {
    counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        "service" => service.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_upstream_duration_seconds", METRICS_PREFIX),
        "service" => service.to_string()
    )
    .record(duration_secs);
}

pub fn record_rate_limited(service: &str) {
    counter!(
        format!("{}_upstream_rate_limited_total", METRICS_PREFIX),
        "service" => service.to_string()
    )
    .increment(1);
}

pub fn record_retry_exhausted(service: &str) {
    counter!(
        format!("{}_upstream_retries_exhausted_total", METRICS_PREFIX),
        "service" => service.to_string()
    )
    .increment(1);
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, result_count: usize, dropped: usize) {
    counter!(format!("{}_search_queries_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_search_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_search_results_count", METRICS_PREFIX)).set(result_count as f64);

    counter!(format!("{}_enrichment_misses_total", METRICS_PREFIX)).increment(dropped as u64);
}

pub fn record_keyword_fallback() {
    counter!(format!("{}_keyword_fallbacks_total", METRICS_PREFIX)).increment(1);
}

pub fn record_graph(kind: &str, nodes: usize) {
    counter!(
        format!("{}_graph_nodes_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(nodes as u64);
}

/// Helper to record one broadcast round
pub fn record_log_broadcast(delivered: usize, pruned: usize, remaining: usize) {
    counter!(format!("{}_log_messages_sent_total", METRICS_PREFIX)).increment(delivered as u64);

    if pruned > 0 {
        counter!(format!("{}_log_connections_pruned_total", METRICS_PREFIX)).increment(pruned as u64);
    }

    gauge!(format!("{}_log_connections_active", METRICS_PREFIX)).set(remaining as f64);
}

pub fn set_log_connections(count: usize) {
    gauge!(format!("{}_log_connections_active", METRICS_PREFIX)).set(count as f64);
}

pub fn record_log_dropped() {
    counter!(format!("{}_log_lines_dropped_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Buckets must be strictly increasing
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // The full default backoff schedule (5+10+20+40+80 s) must fit
        assert!(LATENCY_BUCKETS.contains(&155.0));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("GET", "/search/papers");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }

    #[test]
    fn test_helpers_without_recorder() {
        record_upstream_request("semantic_scholar", 429, 0.2);
        record_log_broadcast(3, 1, 2);
        record_search(1.5, 7, 3);
    }
}
