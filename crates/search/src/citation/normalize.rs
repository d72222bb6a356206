//! Provider payload to node/link graph
//!
//! Payloads look like `{"data": [{"citingPaper": {...}}, ...]}` for
//! citations and `{"data": [{"citedPaper": {...}}, ...]}` for references.
//! Anything that does not match is skipped, never raised.

use scholar_common::models::{EdgeKind, Graph, GraphEdge, GraphNode};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Turn a citations or references payload into a graph around `root_id`
pub fn normalize(raw: &Value, root_id: &str, kind: EdgeKind) -> Graph {
    let entries: &[Value] = match raw.get("data") {
        Some(Value::Array(entries)) => entries.as_slice(),
        _ => &[],
    };
    info!(kind = kind.as_str(), entries = entries.len(), "Processing {} data", kind.as_str());

    let mut graph = Graph::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(paper) = paper_object(entry, kind) else {
            debug!(index, "Skipping entry that is not an object");
            continue;
        };
        let Some(paper_id) = paper_id(paper) else {
            debug!(index, "Skipping entry without paperId");
            continue;
        };

        let title = paper.get("title").and_then(Value::as_str);
        let year = paper
            .get("year")
            .and_then(Value::as_i64)
            .and_then(|y| i32::try_from(y).ok());
        let cited_by_count = paper.get("citationCount").and_then(Value::as_u64).unwrap_or(0);

        let node = GraphNode::new(paper_id, title, year, cited_by_count, kind.into());
        debug!(index, title = %node.title, "Adding {} paper", kind.as_str());
        graph.add_node(node);
        graph.add_edge(GraphEdge::relative_to_root(root_id, paper_id, kind));
    }

    info!(
        nodes = graph.node_count(),
        links = graph.edge_count(),
        "Finished processing {} data",
        kind.as_str()
    );
    graph
}

/// Nested paper object if present and an object, otherwise the entry itself
fn paper_object(entry: &Value, kind: EdgeKind) -> Option<&Map<String, Value>> {
    let entry = entry.as_object()?;
    match entry.get(kind.nested_key()) {
        Some(Value::Object(nested)) => Some(nested),
        _ => Some(entry),
    }
}

fn paper_id(paper: &Map<String, Value>) -> Option<&str> {
    paper
        .get("paperId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_common::models::NodeKind;
    use serde_json::json;

    #[test]
    fn test_citations_payload() {
        let raw = json!({
            "data": [
                {"citingPaper": {"paperId": "c1", "title": "Graph Attention Networks", "year": 2018, "citationCount": 12000}},
                {"citingPaper": {"paperId": "c2", "title": null, "year": null}}
            ]
        });
        let graph = normalize(&raw, "root", EdgeKind::Citation);

        assert_eq!(graph.node_count(), 2);
        let first = graph.node("c1").unwrap();
        assert_eq!(first.title, "Graph Attention Networks");
        assert_eq!(first.year, Some(2018));
        assert_eq!(first.cited_by_count, 12000);
        assert_eq!(first.kind, NodeKind::Citation);

        let second = graph.node("c2").unwrap();
        assert_eq!(second.title, "Unknown title");
        assert_eq!(second.year, None);
        assert_eq!(second.cited_by_count, 0);

        let edge = &graph.links()[0];
        assert_eq!((edge.source.as_str(), edge.target.as_str()), ("root", "c1"));
        assert_eq!(edge.kind, EdgeKind::Citation);
    }

    #[test]
    fn test_reference_edges_point_at_root() {
        let raw = json!({"data": [{"citedPaper": {"paperId": "r1", "title": "LSTM"}}]});
        let graph = normalize(&raw, "root", EdgeKind::Reference);

        let edge = &graph.links()[0];
        assert_eq!((edge.source.as_str(), edge.target.as_str()), ("r1", "root"));
        assert_eq!(graph.node("r1").unwrap().kind, NodeKind::Reference);
    }

    #[test]
    fn test_unresolvable_entries_are_dropped() {
        let raw = json!({
            "data": [
                {"citedPaper": {"paperId": "r1"}},
                null,
                "not an object",
                42,
                {"citedPaper": {"paperId": null, "title": "no id"}},
                {"citedPaper": {"paperId": "", "title": "empty id"}},
                {"citedPaper": {"paperId": 17}},
                {"citedPaper": null, "paperId": "r2"},
                {"paperId": "r3", "title": "flat entry"}
            ]
        });
        let graph = normalize(&raw, "root", EdgeKind::Reference);

        let ids: Vec<_> = graph.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
        assert_eq!(graph.edge_count(), 3);
        for edge in graph.links() {
            assert!(edge.target == "root" && graph.contains(&edge.source));
        }
    }

    #[test]
    fn test_missing_or_invalid_data() {
        for raw in [json!({}), json!({"data": null}), json!({"data": {"paperId": "x"}}), json!("oops")] {
            let graph = normalize(&raw, "root", EdgeKind::Citation);
            assert!(graph.is_empty());
        }
    }

    #[test]
    fn test_long_titles_truncated() {
        let long = "A".repeat(80);
        let raw = json!({"data": [
            {"citingPaper": {"paperId": "c1", "title": long}},
            {"citingPaper": {"paperId": "c2", "title": "B".repeat(50)}}
        ]});
        let graph = normalize(&raw, "root", EdgeKind::Citation);

        let truncated = &graph.node("c1").unwrap().title;
        assert_eq!(truncated.chars().count(), 53);
        assert!(truncated.ends_with("..."));
        assert_eq!(graph.node("c2").unwrap().title, "B".repeat(50));
    }

    #[test]
    fn test_duplicate_neighbor_keeps_first_node_and_all_edges() {
        let raw = json!({"data": [
            {"citingPaper": {"paperId": "c1", "title": "first"}},
            {"citingPaper": {"paperId": "c1", "title": "second"}}
        ]});
        let graph = normalize(&raw, "root", EdgeKind::Citation);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node("c1").unwrap().title, "first");
        assert_eq!(graph.edge_count(), 2);
    }
}
