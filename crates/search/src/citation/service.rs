//! Paper lookup and citation/reference graph assembly

use super::{merge, normalize};
use scholar_common::config::GraphConfig;
use scholar_common::errors::Result;
use scholar_common::metrics;
use scholar_common::models::{EdgeKind, Graph, GraphNode, NodeKind};
use scholar_common::providers::{MetadataProvider, MetadataRequest};
use scholar_common::retry::{Fetched, RetryExecutor};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Citation graph service backed by the metadata provider
pub struct CitationService {
    provider: Arc<dyn MetadataProvider>,
    executor: RetryExecutor,
    max_nodes_cap: usize,
}

impl CitationService {
    pub fn new(provider: Arc<dyn MetadataProvider>, executor: RetryExecutor, config: &GraphConfig) -> Self {
        Self {
            provider,
            executor,
            max_nodes_cap: config.max_nodes_cap.max(1),
        }
    }

    /// Number of neighbors requested upstream
    pub fn limit(&self, max_nodes: usize) -> usize {
        max_nodes.min(self.max_nodes_cap)
    }

    /// Raw paper object as returned by the provider
    pub async fn paper(&self, paper_id: &str) -> Result<Value> {
        info!(paper_id = %paper_id, "Getting paper details");
        let request = MetadataRequest::Paper { id: paper_id.to_string() };
        let body = self
            .provider
            .fetch(&request)
            .await?
            .into_result(self.provider.name())?;

        let title = body.get("title").and_then(|t| t.as_str()).unwrap_or("Unknown");
        info!(title = %title, "Retrieved paper data");
        Ok(body)
    }

    /// Papers citing `paper_id`
    pub async fn citations(&self, paper_id: &str, max_nodes: usize) -> Result<Fetched<Graph>> {
        let request = MetadataRequest::Citations {
            id: paper_id.to_string(),
            limit: self.limit(max_nodes),
        };
        self.neighbors(request, paper_id, EdgeKind::Citation).await
    }

    /// Papers referenced by `paper_id`
    pub async fn references(&self, paper_id: &str, max_nodes: usize) -> Result<Fetched<Graph>> {
        let request = MetadataRequest::References {
            id: paper_id.to_string(),
            limit: self.limit(max_nodes),
        };
        self.neighbors(request, paper_id, EdgeKind::Reference).await
    }

    /// Citations and references merged under a root node for the paper.
    ///
    /// A failed paper lookup only costs the root its metadata. The root keeps
    /// the requested id so edges built from it always resolve.
    pub async fn network(&self, paper_id: &str, max_nodes: usize) -> Result<Fetched<Graph>> {
        let (paper, parts) = tokio::join!(self.paper(paper_id), async {
            tokio::try_join!(
                self.citations(paper_id, max_nodes),
                self.references(paper_id, max_nodes)
            )
        });
        let (citations, references) = parts?;

        let root = match paper {
            Ok(body) => root_node(paper_id, &body),
            Err(e) => {
                warn!(paper_id = %paper_id, error = %e, "Paper lookup failed, using bare root node");
                GraphNode::new(paper_id, None, None, 0, NodeKind::Root)
            }
        };

        let exhausted = citations.exhausted || references.exhausted;
        let graph = merge(root, &[citations.value, references.value]);
        info!(
            paper_id = %paper_id,
            nodes = graph.node_count(),
            links = graph.edge_count(),
            "Assembled citation network"
        );
        Ok(Fetched { value: graph, exhausted })
    }

    async fn neighbors(&self, request: MetadataRequest, root_id: &str, kind: EdgeKind) -> Result<Fetched<Graph>> {
        info!(paper_id = %root_id, kind = kind.as_str(), "Fetching {} network", kind.as_str());

        let provider = &self.provider;
        let request = &request;
        let fetched = self
            .executor
            .fetch(provider.name(), move || provider.fetch(request))
            .await?;

        let graph = fetched.map(|body| normalize(&body, root_id, kind));
        metrics::record_graph(kind.as_str(), graph.value.node_count());
        Ok(graph)
    }
}

/// Root node built from a paper object, identified by the requested id
fn root_node(paper_id: &str, paper: &Value) -> GraphNode {
    GraphNode::new(
        paper_id,
        paper.get("title").and_then(Value::as_str),
        paper
            .get("year")
            .and_then(Value::as_i64)
            .and_then(|y| i32::try_from(y).ok()),
        paper.get("citationCount").and_then(Value::as_u64).unwrap_or(0),
        NodeKind::Root,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use scholar_common::errors::AppError;
    use scholar_common::providers::{MockMetadataProvider, ProviderResponse};
    use scholar_common::retry::{RetryPolicy, Sleeper};
    use serde_json::json;
    use std::time::Duration;

    struct NoSleep;

    #[async_trait]
    impl Sleeper for NoSleep {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn service(provider: Arc<MockMetadataProvider>) -> CitationService {
        let executor = RetryExecutor::with_sleeper(RetryPolicy::default(), Arc::new(NoSleep));
        CitationService::new(provider, executor, &GraphConfig::default())
    }

    fn citations_request(limit: usize) -> MetadataRequest {
        MetadataRequest::Citations { id: "root".into(), limit }
    }

    fn references_request(limit: usize) -> MetadataRequest {
        MetadataRequest::References { id: "root".into(), limit }
    }

    #[tokio::test]
    async fn test_limit_is_capped() {
        let provider = Arc::new(MockMetadataProvider::new());
        provider.respond(citations_request(100), ProviderResponse::ok(json!({"data": []})));

        let service = service(provider.clone());
        service.citations("root", 500).await.unwrap();
        assert_eq!(provider.calls(), vec![citations_request(100)]);
    }

    #[tokio::test]
    async fn test_citations_after_rate_limiting() {
        let provider = Arc::new(MockMetadataProvider::new());
        provider
            .respond(citations_request(50), ProviderResponse::new(StatusCode::TOO_MANY_REQUESTS, Value::Null))
            .respond(
                citations_request(50),
                ProviderResponse::ok(json!({"data": [{"citingPaper": {"paperId": "c1", "title": "GAT"}}]})),
            );

        let graph = service(provider.clone()).citations("root", 50).await.unwrap();
        assert!(graph.is_complete());
        assert_eq!(graph.value.node_count(), 1);
        assert_eq!(provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_yield_empty_graph() {
        let provider = Arc::new(MockMetadataProvider::new());
        provider.respond(
            references_request(50),
            ProviderResponse::new(StatusCode::TOO_MANY_REQUESTS, Value::Null),
        );

        let graph = service(provider.clone()).references("root", 50).await.unwrap();
        assert!(graph.exhausted);
        assert!(graph.value.is_empty());
        assert_eq!(provider.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_an_error() {
        let provider = Arc::new(MockMetadataProvider::new());
        let err = service(provider).citations("root", 50).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_network_merges_under_root() {
        let provider = Arc::new(MockMetadataProvider::new());
        provider
            .respond(
                MetadataRequest::Paper { id: "root".into() },
                ProviderResponse::ok(json!({"paperId": "root", "title": "Attention Is All You Need", "year": 2017, "citationCount": 90000})),
            )
            .respond(
                citations_request(50),
                ProviderResponse::ok(json!({"data": [
                    {"citingPaper": {"paperId": "c1", "title": "BERT"}},
                    {"citingPaper": {"paperId": "shared", "title": "Shared"}}
                ]})),
            )
            .respond(
                references_request(50),
                ProviderResponse::ok(json!({"data": [
                    {"citedPaper": {"paperId": "shared", "title": "Shared"}},
                    {"citedPaper": {"paperId": "r1", "title": "Adam"}}
                ]})),
            );

        let graph = service(provider).network("root", 50).await.unwrap().into_value();
        let root = &graph.nodes()[0];
        assert_eq!(root.kind, NodeKind::Root);
        assert_eq!(root.title, "Attention Is All You Need");
        assert_eq!(root.cited_by_count, 90000);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.node("shared").unwrap().kind, NodeKind::Citation);
    }

    #[tokio::test]
    async fn test_network_without_paper_details() {
        let provider = Arc::new(MockMetadataProvider::new());
        provider
            .respond(citations_request(50), ProviderResponse::ok(json!({"data": []})))
            .respond(references_request(50), ProviderResponse::ok(json!({"data": []})));

        let graph = service(provider).network("root", 50).await.unwrap().into_value();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.nodes()[0].title, "Unknown title");
    }

    #[tokio::test]
    async fn test_network_fails_when_a_side_fails() {
        let provider = Arc::new(MockMetadataProvider::new());
        provider.respond(citations_request(50), ProviderResponse::ok(json!({"data": []})));

        assert!(service(provider).network("root", 50).await.is_err());
    }

    #[tokio::test]
    async fn test_network_root_keeps_requested_alias() {
        let alias = "arXiv:1706.03762";
        let provider = Arc::new(MockMetadataProvider::new());
        provider
            .respond(
                MetadataRequest::Paper { id: alias.into() },
                ProviderResponse::ok(json!({"paperId": "204e3073", "title": "Attention Is All You Need"})),
            )
            .respond(
                MetadataRequest::Citations { id: alias.into(), limit: 50 },
                ProviderResponse::ok(json!({"data": [{"citingPaper": {"paperId": "c1"}}]})),
            )
            .respond(
                MetadataRequest::References { id: alias.into(), limit: 50 },
                ProviderResponse::ok(json!({"data": []})),
            );

        let graph = service(provider).network(alias, 50).await.unwrap().into_value();
        let root = &graph.nodes()[0];
        assert_eq!(root.id, alias);
        assert_eq!(root.title, "Attention Is All You Need");
        assert_eq!(graph.edge_count(), 1);
        for edge in graph.links() {
            assert!(graph.contains(&edge.source), "unresolved source {}", edge.source);
            assert!(graph.contains(&edge.target), "unresolved target {}", edge.target);
        }
    }

    #[tokio::test]
    async fn test_network_flags_rate_limited_side() {
        let provider = Arc::new(MockMetadataProvider::new());
        provider
            .respond(citations_request(50), ProviderResponse::ok(json!({"data": [{"citingPaper": {"paperId": "c1"}}]})))
            .respond(
                references_request(50),
                ProviderResponse::new(StatusCode::TOO_MANY_REQUESTS, Value::Null),
            );

        let graph = service(provider).network("root", 50).await.unwrap();
        assert!(graph.exhausted);
        assert_eq!(graph.value.node_count(), 2);
    }

    #[tokio::test]
    async fn test_paper_passthrough() {
        let provider = Arc::new(MockMetadataProvider::new());
        provider.respond(
            MetadataRequest::Paper { id: "p1".into() },
            ProviderResponse::ok(json!({"paperId": "p1", "venue": "NeurIPS"})),
        );

        let body = tokio_test::assert_ok!(service(provider).paper("p1").await);
        assert_eq!(body["venue"], "NeurIPS");
    }
}
