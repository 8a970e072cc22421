//! Shared application state for the Axum API server.

use herald_common::config::AppConfig;
use herald_notifier::dispatcher::Notifier;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub notifier: Notifier,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(pool: PgPool, notifier: Notifier, config: AppConfig) -> Self {
        Self {
            pool,
            notifier,
            config,
        }
    }
}
