//! Data models shared by the search, graph and log streaming services

mod graph;
mod log;
mod paper;

pub use graph::{display_title, EdgeKind, Graph, GraphEdge, GraphNode, NodeKind, TITLE_DISPLAY_LIMIT, UNKNOWN_TITLE};
pub use log::LogMessage;
pub use paper::{MetadataAuthor, MetadataPaper, OrganicResult, PaperRecord};
