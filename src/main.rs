use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod infrastructure;
mod media;
mod modules;
mod state;
#[cfg(test)]
mod test_support;
mod workers;

use config::settings::AppConfig;
use infrastructure::db::pool::connect_to_db;
use infrastructure::queue::rabbitmq::RabbitMqService;
use infrastructure::redis::client::RedisService;
use infrastructure::storage::s3::StorageService;
use media::process::SystemProcessInvoker;
use modules::video::repository::VideoRepository;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting transcoding worker...");

    let config = AppConfig::new().context("Missing required environment variable")?;

    let pool = connect_to_db(&config.database_url, config.worker_concurrency)
        .await
        .context("Failed to connect to PostgreSQL")?;
    let redis = RedisService::new(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    let storage = StorageService::new(
        &config.minio_url,
        &config.raw_uploads_bucket,
        &config.minio_access_key,
        &config.minio_secret_key,
    )
    .await;
    let amqp_url = config.amqp_url().context("Invalid RabbitMQ address")?;
    let queue = RabbitMqService::new(&amqp_url).await?;

    let state = AppState::new(
        config,
        Arc::new(VideoRepository::new(pool)),
        Arc::new(storage),
        Arc::new(redis),
        Arc::new(SystemProcessInvoker),
        reqwest::Client::new(),
    );

    workers::transcoder::start_transcoder_worker(state, queue).await
}
