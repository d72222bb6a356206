//! Paper records and the upstream payload shapes they are built from

use serde::{Deserialize, Serialize};

use super::graph::UNKNOWN_TITLE;

/// Canonical representation of a scholarly work returned by search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Canonical id once enriched, provider-local id before
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub snippet: Option<String>,
    pub source: Option<String>,
    pub year: Option<i32>,
    #[serde(rename = "cited_by_count")]
    pub citation_count: u64,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Metadata-provider id, present only on enriched records
    #[serde(rename = "paperId", skip_serializing_if = "Option::is_none", default)]
    pub paper_id: Option<String>,
}

impl PaperRecord {
    /// Provisional record from a search-engine hit, before enrichment
    pub fn provisional(result: &OrganicResult) -> Self {
        Self {
            id: result.result_id.clone().unwrap_or_default(),
            title: result.title.clone().unwrap_or_default(),
            link: result.link.clone(),
            snippet: result.snippet.clone(),
            source: result.source.clone(),
            year: None,
            citation_count: 0,
            authors: Vec::new(),
            abstract_text: result.snippet.clone(),
            paper_id: None,
        }
    }

    /// Record built directly from a metadata-provider paper
    pub fn from_metadata(paper: &MetadataPaper) -> Option<Self> {
        let id = paper.canonical_id()?.to_string();
        Some(Self {
            id: id.clone(),
            title: paper.title.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            link: None,
            snippet: None,
            source: None,
            year: paper.year,
            citation_count: paper.citation_count.unwrap_or(0),
            authors: paper.author_names(),
            abstract_text: paper.abstract_text.clone(),
            paper_id: Some(id),
        })
    }

    /// Overlay metadata-provider values onto this record.
    ///
    /// Returns false, leaving the record untouched, when the paper carries no
    /// canonical id.
    pub fn enrich(&mut self, paper: &MetadataPaper) -> bool {
        let Some(id) = paper.canonical_id() else {
            return false;
        };
        if let Some(title) = &paper.title {
            self.title = title.clone();
        }
        self.abstract_text = paper.abstract_text.clone();
        self.year = paper.year;
        self.citation_count = paper.citation_count.unwrap_or(0);
        self.authors = paper.author_names();
        self.id = id.to_string();
        self.paper_id = Some(id.to_string());
        true
    }

    /// Whether this record carries a canonical identifier
    pub fn is_canonical(&self) -> bool {
        self.paper_id.is_some()
    }
}

/// Paper object as returned by the metadata provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataPaper {
    #[serde(rename = "paperId")]
    pub paper_id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    #[serde(rename = "citationCount")]
    pub citation_count: Option<u64>,
    #[serde(default)]
    pub authors: Vec<MetadataAuthor>,
}

impl MetadataPaper {
    /// Non-empty paper id, if any
    pub fn canonical_id(&self) -> Option<&str> {
        self.paper_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn author_names(&self) -> Vec<String> {
        self.authors.iter().filter_map(|a| a.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataAuthor {
    #[serde(rename = "authorId", skip_serializing_if = "Option::is_none", default)]
    pub author_id: Option<String>,
    pub name: Option<String>,
}

/// Organic hit from the literature search engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganicResult {
    pub title: Option<String>,
    pub link: Option<String>,
    pub snippet: Option<String>,
    pub source: Option<String>,
    pub result_id: Option<String>,
}
