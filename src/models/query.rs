//! Query models and output formats.

use serde::{Deserialize, Serialize};

use super::document::DocumentChunkWithScore;
use super::filter::DocumentMetadataFilter;

/// Number of results returned when a query does not set `top_k`.
pub const DEFAULT_TOP_K: usize = 3;

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// A natural-language query with an optional metadata filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<DocumentMetadataFilter>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Query {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filter: None,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: DocumentMetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Ranked chunks answering one query, best match first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub results: Vec<DocumentChunkWithScore>,
}

impl QueryResult {
    pub fn new(query: String, results: Vec<DocumentChunkWithScore>) -> Self {
        Self { query, results }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_query_default_top_k() {
        let query: Query = serde_json::from_str(r#"{"query":"where is the dog?"}"#).unwrap();
        assert_eq!(query.top_k, DEFAULT_TOP_K);
        assert!(query.filter.is_none());
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new("cats")
            .with_top_k(5)
            .with_filter(DocumentMetadataFilter::by_document_id("2"));
        assert_eq!(query.top_k, 5);
        assert_eq!(
            query.filter.and_then(|f| f.document_id).as_deref(),
            Some("2")
        );
    }
}
