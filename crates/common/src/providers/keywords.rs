//! Keyword extraction through an OpenAI-compatible chat completion API

use super::KeywordExtractor;
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const KEYWORD_SYSTEM_PROMPT: &str = "You are a helpful assistant that extracts English keywords \
from non-English queries for academic search.";

fn keyword_prompt(query: &str) -> String {
    format!(
        "Convert the following query into English keywords suitable for academic search. \
Return exactly 3 concise keywords and no other explanation.\n\nQuery: {}\n\nEnglish keywords:",
        query
    )
}

/// Chat completion client
pub struct ChatCompletionExtractor {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: Option<String>,
}

impl ChatCompletionExtractor {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl KeywordExtractor for ChatCompletionExtractor {
    async fn extract(&self, query: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let prompt = keyword_prompt(query);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: KEYWORD_SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        metrics::record_upstream_request(self.name(), status.as_u16(), start.elapsed().as_secs_f64());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::upstream(self.name(), status.as_u16(), body));
        }

        let result: ChatResponse = response.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::upstream(self.name(), status.as_u16(), "empty completion"))
    }

    fn name(&self) -> &str {
        "llm"
    }
}

/// Extractor used when no LLM is configured; every call fails so callers
/// keep the original query
pub struct DisabledExtractor;

#[async_trait]
impl KeywordExtractor for DisabledExtractor {
    async fn extract(&self, _query: &str) -> Result<String> {
        Err(AppError::Configuration {
            message: "keyword extraction is not configured".to_string(),
        })
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Create a keyword extractor based on configuration
pub fn create_keyword_extractor(config: &LlmConfig) -> Result<Arc<dyn KeywordExtractor>> {
    match (config.provider.as_str(), config.api_key.as_deref()) {
        ("openai", Some(key)) if !key.is_empty() => {
            Ok(Arc::new(ChatCompletionExtractor::new(key.to_string(), config)?))
        }
        ("openai", _) => {
            tracing::warn!("LLM API key not set, keyword extraction disabled");
            Ok(Arc::new(DisabledExtractor))
        }
        ("none", _) => Ok(Arc::new(DisabledExtractor)),
        (provider, _) => {
            tracing::warn!(provider = provider, "Unknown keyword extraction provider, disabling");
            Ok(Arc::new(DisabledExtractor))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_query() {
        let prompt = keyword_prompt("图神经网络");
        assert!(prompt.contains("Query: 图神经网络"));
        assert!(prompt.contains("exactly 3"));
    }

    #[tokio::test]
    async fn test_factory_without_key_disables_extraction() {
        let extractor = create_keyword_extractor(&LlmConfig::default()).unwrap();
        assert_eq!(extractor.name(), "disabled");
        assert!(extractor.extract("量子计算").await.is_err());
    }

    #[test]
    fn test_factory_with_key() {
        let config = LlmConfig {
            api_key: Some("sk-test".into()),
            ..LlmConfig::default()
        };
        let extractor = create_keyword_extractor(&config).unwrap();
        assert_eq!(extractor.name(), "llm");
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "qwen-plus",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            temperature: 0.3,
            max_tokens: 100,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 100);
    }
}
