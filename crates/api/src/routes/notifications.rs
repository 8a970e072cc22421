//! Notification routes: demo dispatch, unread listing, mark as read.
//!
//! There is no authentication layer; the "current user" is the first user in
//! the database.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use herald_common::error::AppError;
use herald_common::types::{Notification, Recipient};
use herald_notifier::service::NotificationService;

use crate::state::AppState;

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_NAME: &str = "Demo User";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_unread))
        .route("/notifications/demo", post(send_demo))
        .route("/notifications/{id}/read", post(mark_as_read))
}

/// Response for a queued demo notification.
#[derive(Debug, Serialize)]
pub struct DemoResponse {
    pub message: String,
    pub user_id: i64,
    pub task_id: Uuid,
}

/// One entry of the unread listing.
#[derive(Debug, Serialize)]
pub struct NotificationView {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

impl From<Notification> for NotificationView {
    fn from(n: Notification) -> Self {
        Self {
            is_read: n.is_read(),
            id: n.id,
            title: n.title,
            body: n.body,
            url: n.url,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub notifications: Vec<NotificationView>,
}

#[derive(Debug, Serialize)]
pub struct ReadState {
    pub id: i64,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub message: String,
    pub notification: ReadState,
}

/// POST /notifications/demo — Queue a test notification for the first user,
/// creating a demo user if none exists.
async fn send_demo(State(state): State<AppState>) -> Result<Json<DemoResponse>, AppError> {
    let user = demo_user(&state).await?;

    let task_id = state
        .notifier
        .notify(
            user.id,
            "Test Notification",
            "This is a test notification from the demo endpoint.",
            Some("/dashboard".to_string()),
        )
        .await?;

    tracing::info!(user_id = user.id, task_id = %task_id, "Demo notification queued");

    Ok(Json(DemoResponse {
        message: "Notification queued successfully".to_string(),
        user_id: user.id,
        task_id,
    }))
}

/// GET /notifications — List unread notifications for the first user.
async fn list_unread(State(state): State<AppState>) -> Result<Json<ListResponse>, AppError> {
    let user = NotificationService::first_recipient(&state.pool)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(
                "No user found. Please create a user first by calling POST /notifications/demo"
                    .to_string(),
            )
        })?;

    let notifications = NotificationService::list_unread(&state.pool, user.id).await?;

    Ok(Json(ListResponse {
        notifications: notifications.into_iter().map(Into::into).collect(),
    }))
}

/// POST /notifications/:id/read — Mark a notification as read.
///
/// Marking an already-read notification succeeds and reports the original
/// `read_at`.
async fn mark_as_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let current = NotificationService::get(&state.pool, id).await?;

    let (message, notification) = if current.is_read() {
        ("Notification already marked as read", current)
    } else {
        (
            "Notification marked as read",
            NotificationService::mark_as_read(&state.pool, id).await?,
        )
    };

    Ok(Json(MarkReadResponse {
        message: message.to_string(),
        notification: ReadState {
            id: notification.id,
            read_at: notification.read_at(),
        },
    }))
}

async fn demo_user(state: &AppState) -> Result<Recipient, AppError> {
    if let Some(user) = NotificationService::first_recipient(&state.pool).await? {
        return Ok(user);
    }
    NotificationService::create_recipient(&state.pool, DEMO_EMAIL, DEMO_NAME).await
}
