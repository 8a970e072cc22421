use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use herald_common::config::AppConfig;
use herald_common::db;
use herald_common::redis_pool::create_redis_pool;
use herald_notifier::processor::NotificationProcessor;
use herald_notifier::queue::{RedisQueue, RetryPolicy, TaskQueue};
use herald_notifier::store::PgNotificationStore;
use herald_notifier::worker::Worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_notifier=info,herald_common=info".into()),
        )
        .json()
        .init();

    tracing::info!("Herald notification worker starting...");

    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    let redis = create_redis_pool(&config.redis_url).await?;
    let queue = RedisQueue::new(redis, &config.queue_prefix);

    // Tasks claimed by a previous run that never settled them.
    queue.recover_in_flight().await?;

    let queue: Arc<dyn TaskQueue> = Arc::new(queue);
    let processor = NotificationProcessor::new(Arc::new(PgNotificationStore::new(pool)));
    let policy = RetryPolicy::from_config(&config);
    let poll_interval = Duration::from_millis(config.worker_poll_interval_ms);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let concurrency = config.worker_concurrency.max(1);
    let mut handles = Vec::with_capacity(concurrency);
    for id in 0..concurrency {
        let worker = Worker::new(
            id,
            queue.clone(),
            processor.clone(),
            policy,
            poll_interval,
        );
        handles.push(tokio::spawn(worker.run(shutdown_rx.clone())));
    }

    tracing::info!(
        workers = concurrency,
        queue = %config.queue_prefix,
        max_attempts = policy.max_attempts,
        "Workers running"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, stopping gracefully...");
    shutdown_tx.send(true)?;

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker exited abnormally");
        }
    }

    tracing::info!("Herald notification worker stopped.");
    Ok(())
}
