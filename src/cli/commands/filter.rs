use anyhow::{Context, Result};
use clap::Args;

use crate::models::{DocumentMetadataFilter, Source};

/// Metadata filter flags shared by `query` and `delete`.
#[derive(Debug, Default, Args)]
pub struct FilterArgs {
    #[arg(long, help = "Only match chunks of this document")]
    pub document_id: Option<String>,

    #[arg(long, help = "Only match this source: email, file, chat or other")]
    pub source: Option<Source>,

    #[arg(long, help = "Only match this source id")]
    pub source_id: Option<String>,

    #[arg(long, help = "Only match this author")]
    pub author: Option<String>,

    #[arg(long, help = "Earliest created_at (inclusive), e.g. 2024-01-01")]
    pub start_date: Option<String>,

    #[arg(long, help = "Latest created_at (inclusive), e.g. 2024-12-31")]
    pub end_date: Option<String>,

    #[arg(
        long,
        conflicts_with_all = ["document_id", "source", "source_id", "author", "start_date", "end_date"],
        help = "Filter as JSON, e.g. '{\"source\":\"email\",\"author\":\"ana\"}'"
    )]
    pub filter: Option<String>,
}

impl FilterArgs {
    /// Build the filter, or `None` when no flag was given.
    pub fn to_filter(&self) -> Result<Option<DocumentMetadataFilter>> {
        let filter = match self.filter {
            Some(ref raw) => DocumentMetadataFilter::parse_json(raw).context("invalid --filter")?,
            None => {
                let filter = DocumentMetadataFilter {
                    document_id: self.document_id.clone(),
                    source: self.source,
                    source_id: self.source_id.clone(),
                    author: self.author.clone(),
                    start_date: self.start_date.clone(),
                    end_date: self.end_date.clone(),
                };
                filter.validate().context("invalid date filter")?;
                filter
            }
        };

        Ok((!filter.is_empty()).then_some(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_is_no_filter() {
        assert!(FilterArgs::default().to_filter().unwrap().is_none());
    }

    #[test]
    fn test_flags_build_filter() {
        let args = FilterArgs {
            source: Some(Source::Email),
            author: Some("ana".to_string()),
            start_date: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        let filter = args.to_filter().unwrap().unwrap();
        assert_eq!(filter.source, Some(Source::Email));
        assert_eq!(filter.author.as_deref(), Some("ana"));
    }

    #[test]
    fn test_json_filter() {
        let args = FilterArgs {
            filter: Some(r#"{"document_id":"doc-1"}"#.to_string()),
            ..Default::default()
        };
        let filter = args.to_filter().unwrap().unwrap();
        assert_eq!(filter, DocumentMetadataFilter::by_document_id("doc-1"));
    }

    #[test]
    fn test_inverted_dates_rejected() {
        let args = FilterArgs {
            start_date: Some("2024-02-01".to_string()),
            end_date: Some("2024-01-01".to_string()),
            ..Default::default()
        };
        assert!(args.to_filter().is_err());
    }
}
