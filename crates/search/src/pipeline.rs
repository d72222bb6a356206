//! Search enrichment pipeline
//!
//! 1. Rewrite non-English queries into English keywords (best effort)
//! 2. Run the literature search
//! 3. Look every hit up by title in the metadata provider
//! 4. Keep only hits that resolved to a canonical paper id, in ranking order

use crate::keywords::{needs_translation, KeywordNormalizer};
use futures::stream::{self, StreamExt};
use scholar_common::config::SearchConfig;
use scholar_common::errors::Result;
use scholar_common::metrics;
use scholar_common::models::{MetadataPaper, OrganicResult, PaperRecord};
use scholar_common::providers::{KeywordExtractor, MetadataProvider, MetadataRequest, SearchProvider};
use scholar_common::retry::{Fetched, RetryExecutor};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct SearchPipeline {
    search: Arc<dyn SearchProvider>,
    metadata: Arc<dyn MetadataProvider>,
    keywords: Arc<dyn KeywordExtractor>,
    /// Executor configured with the enrichment retry policy
    executor: RetryExecutor,
    normalizer: KeywordNormalizer,
    max_results_cap: usize,
    concurrency: usize,
}

impl SearchPipeline {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        metadata: Arc<dyn MetadataProvider>,
        keywords: Arc<dyn KeywordExtractor>,
        executor: RetryExecutor,
        config: &SearchConfig,
    ) -> Result<Self> {
        Ok(Self {
            search,
            metadata,
            keywords,
            executor,
            normalizer: KeywordNormalizer::new()?,
            max_results_cap: config.max_results_cap.max(1),
            concurrency: config.enrichment_concurrency.max(1),
        })
    }

    /// Search and enrich. Only search-provider failures are errors; keyword
    /// and enrichment problems shrink or reshape the result instead. The
    /// result is flagged exhausted when any lookup gave up on rate limiting.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Fetched<Vec<PaperRecord>>> {
        let start = Instant::now();
        info!(query = %query, max_results, "Starting search for papers");

        let search_query = self.prepare_query(query).await;
        info!(query = %search_query, "Using English query for search");

        let num = max_results.min(self.max_results_cap);
        let hits = self.search.search(&search_query, num).await?;
        info!(count = hits.len(), provider = self.search.name(), "Search provider returned results");

        let total = hits.len();
        let outcomes: Vec<Enriched> = stream::iter(hits.into_iter().enumerate())
            .map(|(index, hit)| self.enrich(index, hit))
            .buffered(self.concurrency)
            .collect()
            .await;

        let exhausted = outcomes.iter().any(|outcome| outcome.exhausted);
        let records: Vec<PaperRecord> = outcomes.into_iter().filter_map(|outcome| outcome.record).collect();

        let dropped = total - records.len();
        metrics::record_search(start.elapsed().as_secs_f64(), records.len(), dropped);
        info!(
            results = records.len(),
            dropped,
            duration_ms = start.elapsed().as_millis() as u64,
            rate_limited = exhausted,
            "Search completed successfully"
        );

        Ok(Fetched {
            value: records,
            exhausted,
        })
    }

    /// The query actually sent to the search provider
    async fn prepare_query(&self, query: &str) -> String {
        if !needs_translation(query) {
            return query.to_string();
        }

        info!(query = %query, extractor = self.keywords.name(), "Extracting keywords from query");
        let keywords = match self.keywords.extract(query).await {
            Ok(completion) => self.normalizer.normalize(&completion),
            Err(e) => {
                error!(error = %e, "Error extracting keywords, using original query");
                metrics::record_keyword_fallback();
                return query.to_string();
            }
        };

        if keywords.is_empty() {
            error!("Keyword extraction returned nothing usable, using original query");
            metrics::record_keyword_fallback();
            return query.to_string();
        }

        info!(keywords = %keywords, "Extracted keywords");
        keywords
    }

    async fn enrich(&self, index: usize, hit: OrganicResult) -> Enriched {
        let mut record = PaperRecord::provisional(&hit);

        let Some(title) = hit.title.as_deref().filter(|t| !t.trim().is_empty()) else {
            info!(index, "Skipping paper without a title");
            return Enriched::default();
        };
        debug!(index, title = %title, "Processing result");

        let lookup = self.lookup(title).await;
        match lookup.value {
            Some(paper) if record.enrich(&paper) => Enriched {
                record: Some(record),
                exhausted: false,
            },
            _ => {
                info!(index, title = %title, "Skipping paper due to missing canonical id");
                Enriched {
                    record: None,
                    exhausted: lookup.exhausted,
                }
            }
        }
    }

    /// Best title match from the metadata provider, if any
    async fn lookup(&self, title: &str) -> Fetched<Option<MetadataPaper>> {
        let request = MetadataRequest::SearchByTitle {
            title: title.to_string(),
            limit: 1,
        };
        let metadata = &self.metadata;
        let request = &request;

        match self
            .executor
            .fetch(metadata.name(), move || metadata.fetch(request))
            .await
        {
            Ok(fetched) => fetched.map(|body| first_match(title, &body)),
            Err(e) => {
                warn!(title = %title, error = %e, "Metadata lookup failed");
                Fetched::complete(None)
            }
        }
    }
}

/// Outcome of enriching one search hit
#[derive(Default)]
struct Enriched {
    record: Option<PaperRecord>,
    /// The lookup gave up on rate limiting
    exhausted: bool,
}

fn first_match(title: &str, body: &Value) -> Option<MetadataPaper> {
    let first = body.get("data").and_then(Value::as_array)?.first()?.clone();
    match serde_json::from_value(first) {
        Ok(paper) => Some(paper),
        Err(e) => {
            warn!(title = %title, error = %e, "Unexpected metadata record shape");
            None
        }
    }
}
