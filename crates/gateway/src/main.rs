//! Scholar Assistant API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Literature search with metadata enrichment
//! - Citation and reference graphs
//! - Live log streaming over WebSocket
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod logstream;
mod middleware;

use axum::{middleware as axum_middleware, routing::get, Router};
use logstream::{BroadcastLayer, LogHub};
use metrics_exporter_prometheus::PrometheusBuilder;
use scholar_common::{
    cache::Cache,
    config::AppConfig,
    errors::Result as AppResult,
    metrics,
    providers::{
        create_keyword_extractor, KeywordExtractor, MetadataProvider, SearchProvider, SemanticScholarClient,
        SerpApiClient,
    },
    retry::{RetryExecutor, RetryPolicy},
};
use scholar_search::{CitationService, SearchPipeline};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    signal,
    sync::{mpsc, oneshot},
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub citations: Arc<CitationService>,
    pub search: Arc<SearchPipeline>,
    pub hub: Arc<LogHub>,
    pub cache: Option<Arc<Cache>>,
}

/// Upstream clients the services are built on
pub struct Providers {
    pub metadata: Arc<dyn MetadataProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub keywords: Arc<dyn KeywordExtractor>,
}

impl Providers {
    fn from_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            metadata: Arc::new(SemanticScholarClient::new(&config.providers.semantic_scholar)?),
            search: Arc::new(SerpApiClient::new(&config.providers.serpapi)?),
            keywords: create_keyword_extractor(&config.providers.llm)?,
        })
    }
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        providers: Providers,
        hub: Arc<LogHub>,
        cache: Option<Arc<Cache>>,
    ) -> AppResult<Self> {
        let graph_executor = RetryExecutor::new(RetryPolicy::from_config(&config.retry));
        let enrichment_executor = RetryExecutor::new(RetryPolicy::enrichment(&config.retry));

        let citations = CitationService::new(providers.metadata.clone(), graph_executor, &config.graph);
        let search = SearchPipeline::new(
            providers.search,
            providers.metadata,
            providers.keywords,
            enrichment_executor,
            &config.search,
        )?;

        Ok(Self {
            config,
            citations: Arc::new(citations),
            search: Arc::new(search),
            hub,
            cache,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Log lines flow: tracing -> BroadcastLayer -> queue -> hub broadcaster
    let hub = Arc::new(LogHub::with_send_timeout(Duration::from_millis(
        config.logstream.send_timeout_ms.max(1),
    )));
    let (log_tx, log_rx) = mpsc::channel(config.logstream.queue_capacity.max(1));

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_directive()));
    let fmt_layer = if config.observability.json_logging {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(BroadcastLayer::new(log_tx))
        .init();

    info!("Starting Scholar Assistant API Gateway v{}", scholar_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .install()?;
        info!(%addr, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    let broadcaster = hub.spawn_broadcaster(log_rx);

    // Optional cache
    let cache = if config.cache.enabled {
        match Cache::connect(&config.cache).await {
            Ok(cache) => {
                info!(url = %config.cache.url(), "Connected to Redis cache");
                Some(Arc::new(cache))
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, continuing without cache");
                None
            }
        }
    } else {
        None
    };

    // Create app state
    let providers = Providers::from_config(&config).map_err(|e| {
        error!(error = %e, "Failed to initialize provider clients");
        e
    })?;
    let state = AppState::new(config.clone(), providers, hub.clone(), cache)?;

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = signalled_tx.send(());
            })
            .await
    });

    // Either the signal arrived or the server already stopped on its own
    let _ = signalled_rx.await;
    hub.shutdown().await;

    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(Ok(result)) => result?,
        Ok(Err(e)) => error!(error = %e, "Server task failed"),
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout_secs,
            "Open connections did not drain in time"
        ),
    }

    broadcaster.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let rate_limit = &state.config.rate_limit;
    let limiter = rate_limit
        .enabled
        .then(|| middleware::rate_limit::create_rate_limiter(rate_limit.requests_per_second, rate_limit.burst));

    // Request/response routes; the log socket stays outside the timeout
    let mut api_routes = Router::new()
        .route("/", get(handlers::health::welcome))
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Search endpoints
        .route("/search/papers", get(handlers::search::search_papers))
        // Graph endpoints
        .route("/graph/paper/{id}", get(handlers::graph::get_paper))
        .route("/graph/citations/{id}", get(handlers::graph::get_citations))
        .route("/graph/references/{id}", get(handlers::graph::get_references))
        .route("/graph/network/{id}", get(handlers::graph::get_network))
        // Export endpoints
        .route("/api/export/search/{query}", get(handlers::export::export_search))
        .route("/api/export/graph/{id}", get(handlers::export::export_graph))
        .route_layer(axum_middleware::from_fn(middleware::metrics::track_metrics))
        .layer(TimeoutLayer::new(state.config.request_timeout()));

    if let Some(limiter) = limiter {
        api_routes = api_routes.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    Router::new()
        .merge(api_routes)
        .route("/ws/logs", get(logstream::ws_logs))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
