//! Command-line interface for the document retrieval service.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Store, search and chat over documents in a vector database.
#[derive(Debug, Parser)]
#[command(name = "doc-retrieval")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check embedding and vector store configuration
    Status,

    /// Store documents from a JSON/JSONL file or stdin
    Upsert(commands::UpsertArgs),

    /// Store a single text file as one document
    UpsertFile(commands::UpsertFileArgs),

    /// Search stored chunks
    Query(commands::QueryArgs),

    /// Delete documents by id, filter, or all
    Delete(commands::DeleteArgs),

    /// Answer a question from stored documents
    Chat(commands::ChatArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_with_filters() {
        let cli = Cli::try_parse_from([
            "doc-retrieval",
            "query",
            "dogs",
            "cats",
            "--top-k",
            "5",
            "--source",
            "email",
            "-f",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        let Commands::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(args.queries, vec!["dogs", "cats"]);
        assert_eq!(args.top_k, Some(5));
        assert!(args.filter.source.is_some());
    }

    #[test]
    fn test_parse_delete_ids() {
        let cli =
            Cli::try_parse_from(["doc-retrieval", "delete", "--id", "a", "--id", "b"]).unwrap();
        let Commands::Delete(args) = cli.command else {
            panic!("expected delete");
        };
        assert_eq!(args.ids, vec!["a", "b"]);
        assert!(!args.all);
    }

    #[test]
    fn test_filter_json_conflicts_with_flags() {
        let result = Cli::try_parse_from([
            "doc-retrieval",
            "delete",
            "--filter",
            "{}",
            "--author",
            "ana",
        ]);
        assert!(result.is_err());
    }
}
