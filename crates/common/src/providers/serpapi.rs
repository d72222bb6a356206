//! SerpAPI Google Scholar client

use super::SearchProvider;
use crate::config::SerpApiConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::OrganicResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};

pub struct SerpApiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    engine: String,
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Option<Vec<OrganicResult>>,
    #[serde(default)]
    error: Option<String>,
}

impl SerpApiClient {
    pub fn new(config: &SerpApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(crate::USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            engine: config.engine.clone(),
        })
    }
}

#[async_trait]
impl SearchProvider for SerpApiClient {
    async fn search(&self, query: &str, num: usize) -> Result<Vec<OrganicResult>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| AppError::Configuration {
            message: "SerpAPI key not configured".to_string(),
        })?;

        let url = format!("{}/search.json", self.base_url);
        let num = num.to_string();
        let start = Instant::now();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("engine", self.engine.as_str()),
                ("q", query),
                ("api_key", api_key),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        metrics::record_upstream_request(self.name(), status.as_u16(), start.elapsed().as_secs_f64());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(self.name(), status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        parse_results(&bytes)
    }

    fn name(&self) -> &str {
        "serpapi"
    }
}

/// Organic results from a search response body; a body that is not the
/// expected JSON is a serialization error
fn parse_results(body: &[u8]) -> Result<Vec<OrganicResult>> {
    let parsed: SerpResponse = serde_json::from_slice(body)?;
    match (parsed.organic_results, parsed.error) {
        (Some(results), _) => Ok(results),
        (None, Some(error)) => {
            // e.g. "Google hasn't returned any results for this query."
            tracing::warn!(error = %error, "SerpAPI returned no organic results");
            Ok(Vec::new())
        }
        (None, None) => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_a_configuration_error() {
        let client = SerpApiClient::new(&SerpApiConfig::default()).unwrap();
        let err = client.search("graph neural networks", 10).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_response_shape() {
        let parsed: SerpResponse = serde_json::from_value(serde_json::json!({
            "search_metadata": {"status": "Success"},
            "organic_results": [
                {"position": 0, "title": "Graph Attention Networks", "result_id": "abc",
                 "link": "https://arxiv.org/abs/1710.10903", "snippet": "We present GATs"}
            ]
        }))
        .unwrap();
        let results = parsed.organic_results.unwrap();
        assert_eq!(results[0].result_id.as_deref(), Some("abc"));
        assert!(results[0].source.is_none());
    }

    #[test]
    fn test_parse_results() {
        let results = parse_results(br#"{"organic_results": [{"title": "GAT", "result_id": "abc"}]}"#).unwrap();
        assert_eq!(results.len(), 1);

        let empty = parse_results(br#"{"error": "Google hasn't returned any results for this query."}"#).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_malformed_body_is_a_serialization_error() {
        let err = parse_results(b"<html>Service Unavailable</html>").unwrap_err();
        assert!(matches!(err, AppError::Serialization(_)));
        assert_eq!(err.code(), crate::errors::ErrorCode::SerializationError);
    }
}
