//! Health check endpoint.
//!
//! Reports whether the database and the notification queue are reachable.
//! Any failing dependency turns the response into `503` with status
//! `"degraded"`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

fn component(ok: bool) -> &'static str {
    if ok { "ok" } else { "unavailable" }
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let (database, queue) = tokio::join!(
        sqlx::query("SELECT 1").execute(&state.pool),
        state.notifier.check_queue(),
    );

    if let Err(e) = &database {
        tracing::warn!(error = %e, "Health check: database unreachable");
    }
    if let Err(e) = &queue {
        tracing::warn!(error = %e, "Health check: queue unreachable");
    }

    let healthy = database.is_ok() && queue.is_ok();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if healthy { "ok" } else { "degraded" },
        "service": "herald-api",
        "version": env!("CARGO_PKG_VERSION"),
        "database": component(database.is_ok()),
        "queue": component(queue.is_ok()),
    });
    (status, Json(body))
}
