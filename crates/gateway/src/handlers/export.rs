//! Export handlers
//!
//! Same data as the search and graph endpoints, bundled for download.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::search::{run_search, SearchResponse};
use crate::AppState;
use scholar_common::{errors::Result, models::Graph};

#[derive(Serialize)]
pub struct GraphExport {
    pub citations: Graph,
    pub references: Graph,
}

/// Search results for `query` with the default result count
pub async fn export_search(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> Result<Json<SearchResponse>> {
    let results = run_search(&state, &query, state.config.search.default_max_results)
        .await
        .map_err(|e| e.in_operation("Error exporting search results"))?;

    Ok(Json(SearchResponse { results }))
}

/// Citation and reference graphs of a paper, fetched concurrently
pub async fn export_graph(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<Json<GraphExport>> {
    let max_nodes = state.config.graph.default_max_nodes;
    let (citations, references) = tokio::try_join!(
        state.citations.citations(&paper_id, max_nodes),
        state.citations.references(&paper_id, max_nodes)
    )
    .map_err(|e| e.in_operation("Error exporting graph data"))?;

    Ok(Json(GraphExport {
        citations: citations.into_value(),
        references: references.into_value(),
    }))
}
