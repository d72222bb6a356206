//! Scholar Assistant Search Library
//!
//! Graph assembly and search enrichment on top of the provider clients in
//! `scholar-common`:
//! - Citation/reference graph normalization and merging
//! - Citation service (paper lookup, graphs, combined network)
//! - Search enrichment pipeline with keyword rewriting

pub mod citation;
pub mod keywords;
pub mod pipeline;

pub use citation::{merge, normalize, CitationService};
pub use pipeline::SearchPipeline;
