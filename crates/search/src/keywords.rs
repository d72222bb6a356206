//! Query language detection and keyword completion cleanup

use regex_lite::Regex;
use scholar_common::errors::{AppError, Result};

/// Last code point of the Latin Extended-B block
const LATIN_SCRIPT_END: u32 = 0x024F;

/// Whether the query has letters outside the Latin script and should be
/// rewritten into English keywords before searching
pub fn needs_translation(query: &str) -> bool {
    query
        .chars()
        .any(|c| c.is_alphabetic() && u32::from(c) > LATIN_SCRIPT_END)
}

/// Turns a free-form completion into a single space-separated query
pub struct KeywordNormalizer {
    marker: Regex,
}

impl KeywordNormalizer {
    pub fn new() -> Result<Self> {
        // "- x", "* x", "• x", "1. x", "2) x", "3、x"
        let marker = Regex::new(r"^(?:[-*•]+|\d+\s*[.)、:])\s*").map_err(|e| AppError::Internal {
            message: format!("invalid keyword marker pattern: {}", e),
        })?;
        Ok(Self { marker })
    }

    /// Strip list markers and quotes, split on newlines, commas and
    /// semicolons, and join the remaining terms with single spaces
    pub fn normalize(&self, completion: &str) -> String {
        completion
            .lines()
            .flat_map(|line| line.split([',', ';', '，', '；', '、']))
            .map(|term| {
                let term = term.trim();
                let term = self.marker.replace(term, "");
                term.trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”' || c.is_whitespace())
                    .to_string()
            })
            .filter(|term| !term.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
