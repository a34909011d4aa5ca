//! Upsert command: store documents from a JSON or JSONL payload.

use anyhow::{Context, Result};
use clap::Args;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::finish;
use crate::cli::output::get_formatter;
use crate::models::{Config, Document, OutputFormat};
use crate::services::DataStore;

/// Arguments for the upsert command.
#[derive(Debug, Args)]
pub struct UpsertArgs {
    /// Path to a JSON or JSONL file of documents (use - for stdin)
    #[arg()]
    pub file: Option<PathBuf>,

    /// Only validate the input without storing it
    #[arg(long)]
    pub validate_only: bool,
}

/// Handle the upsert command.
pub async fn handle_upsert(args: UpsertArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let input = read_input(args.file.as_deref())?;
    let documents = parse_documents(&input)?;

    if documents.is_empty() {
        println!("{}", formatter.format_message("No documents found in input."));
        return Ok(());
    }

    for (i, document) in documents.iter().enumerate() {
        document
            .metadata
            .validate()
            .with_context(|| format!("invalid metadata in document {}", i + 1))?;
    }

    if verbose || args.validate_only {
        eprintln!("Found {} documents to upsert", documents.len());
    }

    if args.validate_only {
        println!(
            "{}",
            formatter.format_message(&format!(
                "Validation successful: {} documents ready for upsert",
                documents.len()
            ))
        );
        return Ok(());
    }

    let datastore = DataStore::init(&config)
        .await
        .context("failed to initialize datastore")?;
    let result = datastore.upsert(documents).await;
    let ids = finish(&datastore, result).await?;

    print!("{}", formatter.format_upserted(&ids));

    if verbose {
        eprintln!("Completed in {}ms", start_time.elapsed().as_millis());
    }

    Ok(())
}

/// Read input from file or stdin.
pub(crate) fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path.to_string_lossy() != "-" => {
            std::fs::read_to_string(path).context("failed to read file")
        }
        _ => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read stdin")?;
            Ok(input)
        }
    }
}

/// Parse documents from a JSON array, a single JSON object, or JSONL.
fn parse_documents(input: &str) -> Result<Vec<Document>> {
    let input = input.trim();

    if input.is_empty() {
        return Ok(Vec::new());
    }

    if input.starts_with('[') {
        return serde_json::from_str(input).context("failed to parse JSON array");
    }

    // A single pretty-printed object spans several lines.
    if let Ok(document) = serde_json::from_str::<Document>(input) {
        return Ok(vec![document]);
    }

    let mut documents = Vec::new();
    for (i, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let document: Document = serde_json::from_str(line)
            .with_context(|| format!("failed to parse JSON at line {}", i + 1))?;
        documents.push(document);
    }

    Ok(documents)
}
