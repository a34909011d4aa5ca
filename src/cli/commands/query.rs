use anyhow::{Context, Result};
use clap::Args;
use std::time::Instant;

use super::{filter::FilterArgs, finish};
use crate::cli::output::get_formatter;
use crate::models::{Config, DocumentMetadataFilter, OutputFormat, Query};
use crate::services::DataStore;

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(required = true, help = "Query text; repeat for several queries")]
    pub queries: Vec<String>,

    #[arg(long, short = 'k', help = "Maximum number of chunks per query")]
    pub top_k: Option<usize>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub async fn handle_query(args: QueryArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let top_k = args.top_k.unwrap_or(config.search.default_top_k);
    if top_k == 0 {
        anyhow::bail!("top-k must be at least 1");
    }

    let filter = args.filter.to_filter()?;
    let queries = build_queries(args.queries, top_k, filter.as_ref());

    if verbose {
        eprintln!("Queries: {}", queries.len());
        eprintln!("  Top-k: {top_k}");
        if let Some(ref filter) = filter {
            eprintln!("  Filter: {}", serde_json::to_string(filter)?);
        }
    }

    let datastore = DataStore::init(&config)
        .await
        .context("failed to initialize datastore")?;
    let result = datastore.query(queries).await;
    let results = finish(&datastore, result).await?;

    print!("{}", formatter.format_query_results(&results));

    if verbose {
        eprintln!("Completed in {}ms", start_time.elapsed().as_millis());
    }

    Ok(())
}

fn build_queries(
    texts: Vec<String>,
    top_k: usize,
    filter: Option<&DocumentMetadataFilter>,
) -> Vec<Query> {
    texts
        .into_iter()
        .map(|text| {
            let query = Query::new(text.trim()).with_top_k(top_k);
            match filter {
                Some(filter) => query.with_filter(filter.clone()),
                None => query,
            }
        })
        .collect()
}
