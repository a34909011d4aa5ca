use anyhow::{Context, Result};
use clap::Args;

use super::{filter::FilterArgs, finish};
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::DataStore;

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(long = "id", help = "Document id to delete; may be repeated")]
    pub ids: Vec<String>,

    #[command(flatten)]
    pub filter: FilterArgs,

    #[arg(long, help = "Delete every stored document")]
    pub all: bool,
}

pub async fn handle_delete(args: DeleteArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let filter = args.filter.to_filter()?;
    if !args.all && args.ids.is_empty() && filter.is_none() {
        anyhow::bail!("nothing to delete: pass --id, a filter flag, or --all");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);

    if verbose {
        if args.all {
            eprintln!("Deleting all documents from {}", config.vector_store.collection);
        } else {
            eprintln!("Deleting {} id(s)", args.ids.len());
        }
    }

    let datastore = DataStore::init(&config)
        .await
        .context("failed to initialize datastore")?;
    let ids = (!args.ids.is_empty()).then_some(args.ids.as_slice());
    let result = datastore.delete(ids, filter.as_ref(), args.all).await;
    finish(&datastore, result).await?;

    let message = if args.all {
        "Deleted all documents".to_string()
    } else {
        let mut parts = Vec::new();
        if !args.ids.is_empty() {
            parts.push(format!("{} id(s)", args.ids.len()));
        }
        if filter.is_some() {
            parts.push("filter matches".to_string());
        }
        format!("Deleted documents by {}", parts.join(" and "))
    };
    println!("{}", formatter.format_message(&message));

    Ok(())
}
