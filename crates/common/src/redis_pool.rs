use redis::Client;
use redis::aio::ConnectionManager;

/// Create a Redis connection manager backing the notification queue.
///
/// The manager reconnects on its own; clones share one multiplexed connection.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}
