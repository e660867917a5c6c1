mod health;
mod pipeline;

use std::sync::Arc;

use anyhow::Result;
use neutralnews_common::tunables::CALLS_PER_MINUTE;
use neutralnews_common::Config;
use neutralnews_embed::{EmbeddingStage, OpenAiEmbedProvider};
use neutralnews_neutralizer::{Neutralizer, OpenAiLlmClient};
use neutralnews_robots::RobotsGate;
use neutralnews_store::ArticleStore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EMBEDDING_DIMENSION: usize = 1536;
const EMBEDDING_MODEL: &str = "text-embedding-3-small";
const INGEST_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);
const RETENTION_INTERVAL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("neutralnews=info".parse()?))
        .init();

    info!("neutral news pipeline starting");

    let config = Config::from_env();
    config.log_redacted();

    let store = Arc::new(ArticleStore::connect(&config.database_url).await?);
    store.migrate().await?;

    let robots = Arc::new(RobotsGate::new());
    let embed = Arc::new(EmbeddingStage::new(
        Arc::new(OpenAiEmbedProvider::new(&config.llm_api_key, EMBEDDING_MODEL)),
        EMBEDDING_DIMENSION,
    ));
    let llm = Arc::new(OpenAiLlmClient::new(&config.llm_api_key, &config.llm_model));
    let neutralizer = Arc::new(Neutralizer::new(store.clone(), llm, CALLS_PER_MINUTE));

    tokio::spawn(health::serve(config.health_port));

    let ingest_store = store.clone();
    let ingest_robots = robots.clone();
    let ingest_embed = embed.clone();
    let ingest_neutralizer = neutralizer.clone();
    let ingest_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(INGEST_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = pipeline::ingest_and_neutralize(
                ingest_store.clone(),
                ingest_robots.clone(),
                ingest_embed.clone(),
                ingest_neutralizer.clone(),
            )
            .await
            {
                error!(error = %e, "ingest-and-neutralize pass failed");
            }
        }
    });

    let retention_store = store.clone();
    let retention_days = config.retention_days;
    let retention_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RETENTION_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) =
                pipeline::retention_sweep(retention_store.clone(), retention_days).await
            {
                error!(error = %e, "retention sweep failed");
            }
        }
    });

    // Both entry points run on their own interval and the scheduler here
    // already serializes each one against itself (a `tick` never fires
    // again before the previous pass's future resolves); concurrent
    // invocations across processes are out of scope for this binary.
    let _ = tokio::join!(ingest_handle, retention_handle);

    Ok(())
}
