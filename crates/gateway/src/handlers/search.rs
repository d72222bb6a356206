//! Search handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use scholar_common::{
    cache::keys,
    errors::{AppError, Result},
    models::PaperRecord,
    retry::Fetched,
};

/// Query string of `GET /search/papers`
#[derive(Debug, Deserialize, Validate)]
pub struct SearchParams {
    #[validate(length(min = 1, max = 1000))]
    pub query: String,

    #[validate(range(min = 1, max = 100))]
    pub max_results: Option<usize>,
}

/// Search response
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<PaperRecord>,
}

/// Search for papers and enrich them with metadata
pub async fn search_papers(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    params.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let max_results = params
        .max_results
        .unwrap_or(state.config.search.default_max_results);

    let results = run_search(&state, &params.query, max_results)
        .await
        .map_err(|e| e.in_operation("Error searching for papers"))?;

    Ok(Json(SearchResponse { results }))
}

/// Run the search pipeline, reading through the cache when one is configured
pub(crate) async fn run_search(state: &AppState, query: &str, max_results: usize) -> Result<Vec<PaperRecord>> {
    match &state.cache {
        Some(cache) => {
            cache
                .get_or_load("search", &keys::search(query, max_results), || {
                    state.search.search(query, max_results)
                })
                .await
        }
        None => state.search.search(query, max_results).await.map(Fetched::into_value),
    }
}
