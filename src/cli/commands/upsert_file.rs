use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::warn;

use super::finish;
use crate::cli::output::get_formatter;
use crate::models::{Config, Document, DocumentMetadata, OutputFormat, Source};
use crate::services::DataStore;
use crate::utils::{calculate_checksum, read_file_content};

#[derive(Debug, Args)]
pub struct UpsertFileArgs {
    #[arg(required = true, help = "Text file to store")]
    pub path: PathBuf,

    #[arg(long, help = "Document id; replaces any document stored under it")]
    pub id: Option<String>,

    #[arg(
        long,
        conflicts_with = "id",
        help = "Derive the document id from a checksum of the content"
    )]
    pub id_from_content: bool,

    #[arg(
        long,
        short = 'm',
        help = "Metadata as JSON, e.g. '{\"author\":\"ana\",\"created_at\":\"2024-01-01\"}'"
    )]
    pub metadata: Option<String>,
}

pub async fn handle_upsert_file(
    args: UpsertFileArgs,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if !args.path.is_file() {
        anyhow::bail!("not a file: {}", args.path.display());
    }

    let text = read_file_content(&args.path, config.chunking.max_file_size)
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    let metadata = file_metadata(args.metadata.as_deref());

    let mut document = Document::new(text, metadata);
    if let Some(id) = args.id {
        document = document.with_id(id);
    } else if args.id_from_content {
        let checksum = calculate_checksum(&document.text);
        document = document.with_id(checksum);
    }

    if verbose {
        eprintln!(
            "Upserting {} ({} bytes)",
            args.path.display(),
            document.text.len()
        );
    }

    let datastore = DataStore::init(&config)
        .await
        .context("failed to initialize datastore")?;
    let result = datastore.upsert(vec![document]).await;
    let ids = finish(&datastore, result).await?;

    print!("{}", formatter.format_upserted(&ids));
    Ok(())
}

/// Metadata from `--metadata`, falling back to a plain file source when absent
/// or unparseable.
fn file_metadata(raw: Option<&str>) -> DocumentMetadata {
    let Some(raw) = raw else {
        return DocumentMetadata::with_source(Source::File);
    };

    match DocumentMetadata::parse_json(raw) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(error = %e, "ignoring invalid --metadata");
            DocumentMetadata::with_source(Source::File)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_metadata_is_file_source() {
        assert_eq!(file_metadata(None).source, Some(Source::File));
    }

    #[test]
    fn test_metadata_json() {
        let metadata = file_metadata(Some(r#"{"source":"chat","author":"bo"}"#));
        assert_eq!(metadata.source, Some(Source::Chat));
        assert_eq!(metadata.author.as_deref(), Some("bo"));
    }

    #[test]
    fn test_invalid_metadata_falls_back() {
        let metadata = file_metadata(Some("{not json"));
        assert_eq!(metadata, DocumentMetadata::with_source(Source::File));

        let metadata = file_metadata(Some(r#"{"created_at":"yesterday"}"#));
        assert_eq!(metadata, DocumentMetadata::with_source(Source::File));
    }
}
