//! Citation graph representation
//!
//! Node/link graph anchored on a root paper, serialized in the
//! `{nodes, links}` shape graph visualizers consume.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Display titles longer than this many characters are truncated
pub const TITLE_DISPLAY_LIMIT: usize = 50;

/// Title used when the provider returns none
pub const UNKNOWN_TITLE: &str = "Unknown title";

/// Relationship between a neighbor and the root paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// The neighbor cites the root
    Citation,
    /// The root references the neighbor
    Reference,
}

impl EdgeKind {
    /// Key under which the provider nests the neighbor's paper record
    pub fn nested_key(&self) -> &'static str {
        match self {
            EdgeKind::Citation => "citingPaper",
            EdgeKind::Reference => "citedPaper",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Citation => "citation",
            EdgeKind::Reference => "reference",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Citation,
    Reference,
    Root,
}

impl From<EdgeKind> for NodeKind {
    fn from(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Citation => NodeKind::Citation,
            EdgeKind::Reference => NodeKind::Reference,
        }
    }
}

/// Title as shown on a graph node: at most 50 characters plus an ellipsis
pub fn display_title(raw: Option<&str>) -> String {
    let title = raw.unwrap_or(UNKNOWN_TITLE);
    match title.char_indices().nth(TITLE_DISPLAY_LIMIT) {
        Some((cut, _)) => format!("{}...", &title[..cut]),
        None => title.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub cited_by_count: u64,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

impl GraphNode {
    /// Build a node, truncating the raw title for display
    pub fn new(
        id: impl Into<String>,
        raw_title: Option<&str>,
        year: Option<i32>,
        cited_by_count: u64,
        kind: NodeKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: display_title(raw_title),
            year,
            cited_by_count,
            kind,
        }
    }
}

/// Directed edge between two papers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

impl GraphEdge {
    /// Edge between the root and a neighbor.
    ///
    /// Citation edges point from the root to the citing paper; reference
    /// edges point from the referenced paper into the root.
    pub fn relative_to_root(root_id: &str, neighbor_id: &str, kind: EdgeKind) -> Self {
        let (source, target) = match kind {
            EdgeKind::Citation => (root_id, neighbor_id),
            EdgeKind::Reference => (neighbor_id, root_id),
        };
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind,
        }
    }
}

/// Node/link graph with nodes unique by id (first insert wins)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "GraphParts")]
pub struct Graph {
    nodes: Vec<GraphNode>,
    links: Vec<GraphEdge>,
    #[serde(skip)]
    ids: HashSet<String>,
}

#[derive(Deserialize)]
struct GraphParts {
    #[serde(default)]
    nodes: Vec<GraphNode>,
    #[serde(default)]
    links: Vec<GraphEdge>,
}

impl From<GraphParts> for Graph {
    fn from(parts: GraphParts) -> Self {
        let mut graph = Graph::new();
        for node in parts.nodes {
            graph.add_node(node);
        }
        graph.links = parts.links;
        graph
    }
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless one with the same id exists. Returns whether it was added.
    pub fn add_node(&mut self, node: GraphNode) -> bool {
        if self.ids.contains(&node.id) {
            return false;
        }
        self.ids.insert(node.id.clone());
        self.nodes.push(node);
        true
    }

    /// Append an edge; edges are never deduplicated
    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.links.push(edge);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[GraphEdge] {
        &self.links
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}
