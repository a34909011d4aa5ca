//! Metadata filter model used to narrow similarity searches and deletions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::document::parse_timestamp;
use super::source::Source;
use crate::error::MetadataError;

/// Conjunction of optional constraints over chunk metadata.
///
/// Equality on `document_id`, `source`, `source_id` and `author`; inclusive
/// bounds on `created_at` through `start_date` / `end_date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadataFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// A filterable metadata field. Backends advertise the ones they can translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    DocumentId,
    Source,
    SourceId,
    Author,
    CreatedAt,
}

impl FilterField {
    pub const ALL: [FilterField; 5] = [
        FilterField::DocumentId,
        FilterField::Source,
        FilterField::SourceId,
        FilterField::Author,
        FilterField::CreatedAt,
    ];
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterField::DocumentId => "document_id",
            FilterField::Source => "source",
            FilterField::SourceId => "source_id",
            FilterField::Author => "author",
            FilterField::CreatedAt => "created_at",
        };
        f.write_str(name)
    }
}

/// Parsed `created_at` bounds in Unix seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl DateRange {
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start.is_none_or(|start| timestamp >= start)
            && self.end.is_none_or(|end| timestamp <= end)
    }
}

impl DocumentMetadataFilter {
    pub fn by_document_id(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            ..Default::default()
        }
    }

    /// Parse and validate a JSON filter payload.
    pub fn parse_json(raw: &str) -> Result<Self, MetadataError> {
        let filter: Self = serde_json::from_str(raw)?;
        filter.validate()?;
        Ok(filter)
    }

    pub fn validate(&self) -> Result<(), MetadataError> {
        self.date_range().map(|_| ())
    }

    /// True when no constraint is set; such a filter matches every chunk.
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// The metadata fields this filter constrains.
    pub fn fields(&self) -> Vec<FilterField> {
        let mut fields = Vec::new();
        if self.document_id.is_some() {
            fields.push(FilterField::DocumentId);
        }
        if self.source.is_some() {
            fields.push(FilterField::Source);
        }
        if self.source_id.is_some() {
            fields.push(FilterField::SourceId);
        }
        if self.author.is_some() {
            fields.push(FilterField::Author);
        }
        if self.start_date.is_some() || self.end_date.is_some() {
            fields.push(FilterField::CreatedAt);
        }
        fields
    }

    pub fn date_range(&self) -> Result<DateRange, MetadataError> {
        let start = self
            .start_date
            .as_deref()
            .map(|value| parse_timestamp("start_date", value))
            .transpose()?;
        let end = self
            .end_date
            .as_deref()
            .map(|value| parse_timestamp("end_date", value))
            .transpose()?;

        if let (Some(s), Some(e)) = (start, end)
            && s > e
        {
            return Err(MetadataError::InvalidRange {
                start: self.start_date.clone().unwrap_or_default(),
                end: self.end_date.clone().unwrap_or_default(),
            });
        }

        Ok(DateRange { start, end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter() {
        let filter = DocumentMetadataFilter::default();
        assert!(filter.is_empty());
        assert!(filter.validate().is_ok());
        assert!(filter.date_range().unwrap().is_unbounded());
    }

    #[test]
    fn test_fields() {
        let filter = DocumentMetadataFilter {
            source: Some(Source::File),
            end_date: Some("2023-01-01".to_string()),
            ..Default::default()
        };
        assert_eq!(
            filter.fields(),
            vec![FilterField::Source, FilterField::CreatedAt]
        );
    }

    #[test]
    fn test_parse_json() {
        let filter = DocumentMetadataFilter::parse_json(
            r#"{"author":"sam","start_date":"2023-01-01","end_date":"2023-06-30"}"#,
        )
        .unwrap();
        assert_eq!(filter.author.as_deref(), Some("sam"));

        let range = filter.date_range().unwrap();
        assert_eq!(range.start, Some(1_672_531_200));
        assert_eq!(range.end, Some(1_688_083_200));
        assert!(range.contains(1_680_307_200));
        assert!(!range.contains(1_600_000_000));
    }

    #[test]
    fn test_rejects_bad_dates() {
        assert!(matches!(
            DocumentMetadataFilter::parse_json(r#"{"start_date":"yesterday"}"#),
            Err(MetadataError::InvalidDate { field: "start_date", .. })
        ));
        assert!(matches!(
            DocumentMetadataFilter::parse_json(
                r#"{"start_date":"2023-06-30","end_date":"2023-01-01"}"#
            ),
            Err(MetadataError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_source() {
        assert!(matches!(
            DocumentMetadataFilter::parse_json(r#"{"source":"pager"}"#),
            Err(MetadataError::Malformed(_))
        ));
    }

    #[test]
    fn test_open_ended_range() {
        let range = DateRange {
            start: Some(100),
            end: None,
        };
        assert!(range.contains(100));
        assert!(range.contains(i64::MAX));
        assert!(!range.contains(99));
    }
}
