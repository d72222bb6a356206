//! Citation graph handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::AppState;
use scholar_common::{
    cache::keys,
    errors::{AppError, Result},
    models::Graph,
    retry::Fetched,
};

/// Query string of the graph endpoints
#[derive(Debug, Deserialize, Validate)]
pub struct GraphParams {
    /// Accepted for compatibility; only direct neighbors are fetched
    #[serde(default = "default_depth")]
    #[validate(range(min = 1, max = 5))]
    pub depth: u32,

    #[validate(range(min = 1))]
    pub max_nodes: Option<usize>,
}

fn default_depth() -> u32 { 1 }

#[derive(Debug, Clone, Copy)]
enum GraphKind {
    Citations,
    References,
    Network,
}

impl GraphKind {
    fn as_str(&self) -> &'static str {
        match self {
            GraphKind::Citations => "citations",
            GraphKind::References => "references",
            GraphKind::Network => "network",
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            GraphKind::Citations => "Error getting citation network",
            GraphKind::References => "Error getting reference network",
            GraphKind::Network => "Error building paper network",
        }
    }
}

/// Paper details, passed through from the metadata provider
pub async fn get_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<Value>> {
    let load = || async { state.citations.paper(&paper_id).await.map(Fetched::complete) };
    let paper = match &state.cache {
        Some(cache) => cache.get_or_load("paper", &keys::paper(&paper_id), load).await,
        None => load().await.map(Fetched::into_value),
    }
    .map_err(|e| e.in_operation("Error getting paper details"))?;

    Ok(Json(paper))
}

/// Papers citing the given paper
pub async fn get_citations(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
    Query(params): Query<GraphParams>,
) -> Result<Json<Graph>> {
    graph_response(&state, GraphKind::Citations, &paper_id, params).await
}

/// Papers referenced by the given paper
pub async fn get_references(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
    Query(params): Query<GraphParams>,
) -> Result<Json<Graph>> {
    graph_response(&state, GraphKind::References, &paper_id, params).await
}

/// Citations and references merged under a root node
pub async fn get_network(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
    Query(params): Query<GraphParams>,
) -> Result<Json<Graph>> {
    graph_response(&state, GraphKind::Network, &paper_id, params).await
}

async fn graph_response(
    state: &AppState,
    kind: GraphKind,
    paper_id: &str,
    params: GraphParams,
) -> Result<Json<Graph>> {
    params.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let max_nodes = params.max_nodes.unwrap_or(state.config.graph.default_max_nodes);
    tracing::info!(
        paper_id = %paper_id,
        kind = kind.as_str(),
        depth = params.depth,
        max_nodes,
        "Getting {} graph",
        kind.as_str()
    );
    if params.depth > 1 {
        tracing::debug!(depth = params.depth, "Only direct neighbors are fetched");
    }

    let load = || fetch_graph(state, kind, paper_id, max_nodes);
    let graph = match &state.cache {
        Some(cache) => {
            let key = keys::graph(kind.as_str(), paper_id, params.depth, max_nodes);
            cache.get_or_load("graph", &key, load).await
        }
        None => load().await.map(Fetched::into_value),
    }
    .map_err(|e| e.in_operation(kind.operation()))?;

    Ok(Json(graph))
}

async fn fetch_graph(
    state: &AppState,
    kind: GraphKind,
    paper_id: &str,
    max_nodes: usize,
) -> Result<Fetched<Graph>> {
    match kind {
        GraphKind::Citations => state.citations.citations(paper_id, max_nodes).await,
        GraphKind::References => state.citations.references(paper_id, max_nodes).await,
        GraphKind::Network => state.citations.network(paper_id, max_nodes).await,
    }
}
