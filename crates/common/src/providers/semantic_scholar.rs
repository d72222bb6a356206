//! Semantic Scholar Graph API client

use super::{MetadataProvider, MetadataRequest, ProviderResponse};
use crate::config::SemanticScholarConfig;
use crate::errors::Result;
use crate::metrics;
use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};

pub struct SemanticScholarClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl SemanticScholarClient {
    pub fn new(config: &SemanticScholarConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(crate::USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MetadataProvider for SemanticScholarClient {
    async fn fetch(&self, request: &MetadataRequest) -> Result<ProviderResponse> {
        let url = format!("{}{}", self.base_url, request.path());
        tracing::debug!(url = %url, kind = request.kind(), "Requesting Semantic Scholar");

        let mut builder = self.client.get(&url).query(&request.query());
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }

        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        metrics::record_upstream_request(self.name(), status.as_u16(), start.elapsed().as_secs_f64());

        // Throttling and gateway errors are not always JSON
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(ProviderResponse::new(status, body))
    }

    fn name(&self) -> &str {
        "semantic_scholar"
    }
}
