//! Upstream provider abstraction
//!
//! One trait per upstream service, each with a single call contract:
//! - Metadata (Semantic Scholar Graph API): papers, citations, references, title search
//! - Literature search (SerpAPI Google Scholar engine)
//! - Keyword extraction (OpenAI-compatible chat completion)
//!
//! Implementations are picked from configuration; tests substitute their own.

mod keywords;
mod mock;
mod semantic_scholar;
mod serpapi;

pub use keywords::{
    create_keyword_extractor, ChatCompletionExtractor, DisabledExtractor, KEYWORD_SYSTEM_PROMPT,
};
pub use mock::{MockKeywordExtractor, MockMetadataProvider, MockSearchProvider};
pub use semantic_scholar::SemanticScholarClient;
pub use serpapi::SerpApiClient;

use crate::errors::{AppError, Result};
use crate::models::OrganicResult;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

/// Fields requested for a single paper lookup
pub const PAPER_FIELDS: &str = "title,abstract,year,authors,citationCount,references,venue";

/// Fields requested for citation and reference neighbors
pub const GRAPH_FIELDS: &str = "paperId,title,citationCount,year";

/// Fields requested when matching a search hit by title
pub const TITLE_SEARCH_FIELDS: &str = "title,abstract,year,authors,citationCount,paperId";

/// Raw upstream response: status plus parsed body.
///
/// Kept unprocessed so the retry executor can react to rate limiting before
/// any status check happens.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ProviderResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Body on success, an upstream failure otherwise
    pub fn into_result(self, service: &str) -> Result<Value> {
        if self.status.is_success() {
            return Ok(self.body);
        }
        Err(AppError::upstream(service, self.status.as_u16(), error_message(&self.body)))
    }
}

/// Best-effort human message from an upstream error body
fn error_message(body: &Value) -> String {
    ["error", "message", "detail"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .or_else(|| body.as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// A request to the metadata provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataRequest {
    /// Single paper by canonical id
    Paper { id: String },
    /// Papers citing the given paper
    Citations { id: String, limit: usize },
    /// Papers referenced by the given paper
    References { id: String, limit: usize },
    /// Best matches for a title
    SearchByTitle { title: String, limit: usize },
}

impl MetadataRequest {
    /// Path relative to the provider base URL
    pub fn path(&self) -> String {
        match self {
            MetadataRequest::Paper { id } => format!("/paper/{}", id),
            MetadataRequest::Citations { id, .. } => format!("/paper/{}/citations", id),
            MetadataRequest::References { id, .. } => format!("/paper/{}/references", id),
            MetadataRequest::SearchByTitle { .. } => "/paper/search".to_string(),
        }
    }

    /// Query string parameters
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            MetadataRequest::Paper { .. } => vec![("fields", PAPER_FIELDS.to_string())],
            MetadataRequest::Citations { limit, .. } | MetadataRequest::References { limit, .. } => vec![
                ("limit", limit.to_string()),
                ("fields", GRAPH_FIELDS.to_string()),
            ],
            MetadataRequest::SearchByTitle { title, limit } => vec![
                ("query", title.clone()),
                ("limit", limit.to_string()),
                ("fields", TITLE_SEARCH_FIELDS.to_string()),
            ],
        }
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            MetadataRequest::Paper { .. } => "paper",
            MetadataRequest::Citations { .. } => "citations",
            MetadataRequest::References { .. } => "references",
            MetadataRequest::SearchByTitle { .. } => "title_search",
        }
    }
}

/// Scholarly metadata provider
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Issue one request; rate limiting and error statuses are returned, not raised
    async fn fetch(&self, request: &MetadataRequest) -> Result<ProviderResponse>;

    /// Provider name for logs and metrics
    fn name(&self) -> &str;
}

/// Literature search engine
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Organic results for a free-text query, in ranking order
    async fn search(&self, query: &str, num: usize) -> Result<Vec<OrganicResult>>;

    fn name(&self) -> &str;
}

/// Language-model keyword extraction
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    /// Raw completion text for the keyword prompt
    async fn extract(&self, query: &str) -> Result<String>;

    fn name(&self) -> &str;
}
