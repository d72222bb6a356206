//! Citation and reference graphs
//!
//! Provider payloads are normalized into node/link graphs anchored on a
//! root paper; the network view merges both directions under that root.

mod merge;
mod normalize;
mod service;

pub use merge::merge;
pub use normalize::normalize;
pub use service::CitationService;
