use redis::Client;
use redis::aio::ConnectionManager;

/// Open a Redis connection manager, used for the queue stats cache.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!(redis_url, "Connected to Redis");
    Ok(manager)
}
