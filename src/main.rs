use anyhow::Result;
use clap::Parser;
use tokio::signal;

use doc_retrieval::cli::commands::{
    handle_chat, handle_config, handle_delete, handle_query, handle_status, handle_upsert,
    handle_upsert_file,
};
use doc_retrieval::cli::output::format_command_error;
use doc_retrieval::cli::{Cli, Commands};
use doc_retrieval::models::{Config, OutputFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Commands load and validate config themselves; here it only picks defaults.
    let config = Config::load().unwrap_or_default();
    doc_retrieval::logging::init(&config.logging, cli.verbose);

    let format = cli.format.unwrap_or(config.search.default_format);
    let verbose = cli.verbose;

    tokio::select! {
        result = run_command(cli.command, format, verbose) => {
            if let Err(e) = result {
                eprintln!("{}", format_command_error(format, &e).trim_end());
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            eprintln!("\nReceived shutdown signal, cleaning up...");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

async fn run_command(command: Commands, format: OutputFormat, verbose: bool) -> Result<()> {
    match command {
        Commands::Status => {
            handle_status(format, verbose).await?;
        }
        Commands::Upsert(args) => {
            handle_upsert(args, format, verbose).await?;
        }
        Commands::UpsertFile(args) => {
            handle_upsert_file(args, format, verbose).await?;
        }
        Commands::Query(args) => {
            handle_query(args, format, verbose).await?;
        }
        Commands::Delete(args) => {
            handle_delete(args, format, verbose).await?;
        }
        Commands::Chat(args) => {
            handle_chat(args, format, verbose).await?;
        }
        Commands::Config(cmd) => {
            handle_config(cmd, format, verbose).await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
