use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;

use super::finish;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{ChatService, DataStore, OpenAiCompletionProvider};
use crate::utils::RetryPolicy;

#[derive(Debug, Args)]
pub struct ChatArgs {
    #[arg(required = true, help = "Question to answer from the stored documents")]
    pub content: String,
}

pub async fn handle_chat(args: ChatArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let content = args.content.trim();
    if content.is_empty() {
        anyhow::bail!("chat content cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);

    let completion =
        OpenAiCompletionProvider::new(&config.completion).context("completion model unavailable")?;
    if verbose {
        eprintln!("Model: {}", completion.model());
    }

    let datastore = Arc::new(
        DataStore::init(&config)
            .await
            .context("failed to initialize datastore")?,
    );
    let chat = ChatService::new(
        Arc::clone(&datastore),
        Arc::new(completion),
        RetryPolicy::from_config(&config.retry),
    );

    let result = chat.answer(content).await;
    let answer = finish(&datastore, result).await?;

    print!("{}", formatter.format_chat(&answer));
    Ok(())
}
