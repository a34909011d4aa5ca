use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};
use crate::services::create_backend;

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let (vector_store_connected, vector_store_points) = match create_backend(
        &config.vector_store,
        u64::from(config.embedding.dimension),
    )
    .await
    {
        Ok(store) => {
            let connected = store.health_check().await.unwrap_or(false);
            let points = if connected {
                store
                    .collection_info()
                    .await
                    .ok()
                    .flatten()
                    .map(|info| info.points_count)
            } else {
                None
            };
            let _ = store.close().await;
            (connected, points)
        }
        Err(_) => (false, None),
    };

    let status = StatusInfo {
        embedding_model: config.embedding.model.clone(),
        completion_model: config.completion.model.clone(),
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected,
        vector_store_points,
        collection: config.vector_store.collection.clone(),
    };

    print!("{}", formatter.format_status(&status));

    if config.embedding.api_key.is_none() {
        eprintln!();
        eprintln!("Hint: OPENAI_API_KEY is not set. Upsert, query and chat need it.");
    }

    match config.vector_store.driver {
        VectorDriver::Memory => {
            eprintln!();
            eprintln!("Note: the memory store does not persist between commands.");
        }
        VectorDriver::Qdrant if !vector_store_connected => {
            eprintln!();
            eprintln!("Warning: Qdrant not running. Start with: docker-compose up -d qdrant");
        }
        VectorDriver::PostgreSQL if !vector_store_connected => {
            eprintln!();
            eprintln!("Warning: PostgreSQL not accessible. Check DATABASE_URL.");
        }
        _ => {}
    }

    Ok(())
}
