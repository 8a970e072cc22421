use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Redis connection string
    pub redis_url: String,

    /// Key prefix for the notification queue lists (default: "herald:notifications")
    pub queue_prefix: String,

    /// Number of concurrent queue workers (default: 4)
    pub worker_concurrency: usize,

    /// Sleep between polls when the queue is empty, in milliseconds (default: 500)
    pub worker_poll_interval_ms: u64,

    /// Deliveries allowed per task before it is dead-lettered (default: 5)
    pub retry_max_attempts: u32,

    /// First retry delay in milliseconds, doubled per attempt (default: 1000)
    pub retry_base_delay_ms: u64,

    /// Upper bound for the retry delay in milliseconds (default: 60000)
    pub retry_max_delay_ms: u64,

    /// HTTP port for the API server (default: 3000)
    pub api_port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "20")?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            queue_prefix: std::env::var("QUEUE_PREFIX")
                .unwrap_or_else(|_| "herald:notifications".to_string()),
            worker_concurrency: parse_var("WORKER_CONCURRENCY", "4")?,
            worker_poll_interval_ms: parse_var("WORKER_POLL_INTERVAL_MS", "500")?,
            retry_max_attempts: parse_var("RETRY_MAX_ATTEMPTS", "5")?,
            retry_base_delay_ms: parse_var("RETRY_BASE_DELAY_MS", "1000")?,
            retry_max_delay_ms: parse_var("RETRY_MAX_DELAY_MS", "60000")?,
            api_port: parse_var("API_PORT", "3000")?,
        })
    }
}

/// Read `key` from the environment, falling back to `default`, and parse it.
fn parse_var<T: std::str::FromStr>(key: &str, default: &str) -> anyhow::Result<T> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim().parse().map_err(|_| {
        anyhow::anyhow!(
            "{} must be a valid {}",
            key,
            std::any::type_name::<T>()
        )
    })
}
