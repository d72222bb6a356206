//! Combine normalized graphs under a single root

use scholar_common::models::{Graph, GraphNode};

/// Seed a graph with `root`, then fold in each part in order.
///
/// Nodes already present (the root included) are skipped; edges are always
/// appended.
pub fn merge(root: GraphNode, parts: &[Graph]) -> Graph {
    let mut merged = Graph::new();
    merged.add_node(root);

    for part in parts {
        for node in part.nodes() {
            merged.add_node(node.clone());
        }
        for edge in part.links() {
            merged.add_edge(edge.clone());
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_common::models::{EdgeKind, GraphEdge, NodeKind};

    fn part(kind: EdgeKind, ids: &[&str]) -> Graph {
        let mut graph = Graph::new();
        for id in ids {
            graph.add_node(GraphNode::new(*id, Some(*id), None, 1, kind.into()));
            graph.add_edge(GraphEdge::relative_to_root("root", id, kind));
        }
        graph
    }

    fn root() -> GraphNode {
        GraphNode::new("root", Some("Root paper"), Some(2017), 100, NodeKind::Root)
    }

    #[test]
    fn test_root_comes_first() {
        let merged = merge(root(), &[part(EdgeKind::Citation, &["a", "b"])]);
        assert_eq!(merged.nodes()[0].kind, NodeKind::Root);
        assert_eq!(merged.node_count(), 3);
        assert_eq!(merged.edge_count(), 2);
    }

    #[test]
    fn test_merging_same_part_twice() {
        let citations = part(EdgeKind::Citation, &["a", "b", "c"]);
        let once = merge(root(), &[citations.clone()]);
        let twice = merge(root(), &[citations.clone(), citations]);

        let ids = |g: &Graph| g.nodes().iter().map(|n| n.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(twice.edge_count(), once.edge_count() * 2);
    }

    #[test]
    fn test_shared_neighbor_keeps_first_kind() {
        let citations = part(EdgeKind::Citation, &["shared"]);
        let references = part(EdgeKind::Reference, &["shared", "r1"]);
        let merged = merge(root(), &[citations, references]);

        assert_eq!(merged.node("shared").unwrap().kind, NodeKind::Citation);
        assert_eq!(merged.node_count(), 3);
        assert_eq!(merged.edge_count(), 3);
    }

    #[test]
    fn test_neighbor_with_root_id_does_not_replace_root() {
        let merged = merge(root(), &[part(EdgeKind::Reference, &["root"])]);
        assert_eq!(merged.node_count(), 1);
        assert_eq!(merged.node("root").unwrap().kind, NodeKind::Root);
    }
}
