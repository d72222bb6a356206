//! Scripted in-memory providers for tests and offline runs

use super::{KeywordExtractor, MetadataProvider, MetadataRequest, ProviderResponse, SearchProvider};
use crate::errors::{AppError, Result};
use crate::models::OrganicResult;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Metadata provider answering from a script keyed by request.
///
/// Each key holds a queue of responses; the last one is repeated once the
/// queue is down to it. Unscripted requests get a 404.
#[derive(Default)]
pub struct MockMetadataProvider {
    script: Mutex<HashMap<String, VecDeque<ProviderResponse>>>,
    calls: Mutex<Vec<MetadataRequest>>,
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(request: &MetadataRequest) -> String {
        match request {
            MetadataRequest::SearchByTitle { title, .. } => format!("title:{}", title),
            other => other.path(),
        }
    }

    /// Queue a response for requests equal in kind and target to `request`
    pub fn respond(&self, request: MetadataRequest, response: ProviderResponse) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.entry(Self::key(&request)).or_default().push_back(response);
        }
        self
    }

    /// Requests received so far, in order
    pub fn calls(&self) -> Vec<MetadataRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn fetch(&self, request: &MetadataRequest) -> Result<ProviderResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }

        let mut script = self.script.lock().map_err(|_| AppError::Internal {
            message: "mock script poisoned".to_string(),
        })?;

        let response = match script.get_mut(&Self::key(request)) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        Ok(response.unwrap_or_else(|| {
            ProviderResponse::new(StatusCode::NOT_FOUND, json!({"error": "Paper not found"}))
        }))
    }

    fn name(&self) -> &str {
        "mock_metadata"
    }
}

/// Search provider returning a fixed result list
#[derive(Default)]
pub struct MockSearchProvider {
    results: Vec<OrganicResult>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl MockSearchProvider {
    pub fn new(results: Vec<OrganicResult>) -> Self {
        Self {
            results,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// `(query, num)` pairs received so far
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str, num: usize) -> Result<Vec<OrganicResult>> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((query.to_string(), num));
        }
        Ok(self.results.iter().take(num).cloned().collect())
    }

    fn name(&self) -> &str {
        "mock_search"
    }
}

/// Keyword extractor with a canned completion; `None` makes every call fail
pub struct MockKeywordExtractor {
    reply: Option<String>,
}

impl MockKeywordExtractor {
    pub fn new(reply: Option<&str>) -> Self {
        Self {
            reply: reply.map(str::to_string),
        }
    }
}

#[async_trait]
impl KeywordExtractor for MockKeywordExtractor {
    async fn extract(&self, _query: &str) -> Result<String> {
        self.reply.clone().ok_or_else(|| AppError::upstream("mock_llm", 503, "unavailable"))
    }

    fn name(&self) -> &str {
        "mock_llm"
    }
}
