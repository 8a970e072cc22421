//! Read-side notification service: recipients, unread listing, mark as read.
//!
//! Thin queries over the same tables the processor writes to; used by the
//! HTTP adapter.

use chrono::{SubsecRound, Utc};
use sqlx::PgPool;

use herald_common::error::AppError;
use herald_common::types::{Notification, Recipient};

/// Service layer for notification queries and the read-state transition.
pub struct NotificationService;

impl NotificationService {
    /// The oldest recipient, if any exists.
    pub async fn first_recipient(pool: &PgPool) -> Result<Option<Recipient>, AppError> {
        let recipient: Option<Recipient> =
            sqlx::query_as("SELECT * FROM users ORDER BY id ASC LIMIT 1")
                .fetch_optional(pool)
                .await?;

        Ok(recipient)
    }

    /// Create a recipient.
    pub async fn create_recipient(
        pool: &PgPool,
        email: &str,
        name: &str,
    ) -> Result<Recipient, AppError> {
        if email.trim().is_empty() {
            return Err(AppError::Validation("email must not be empty".to_string()));
        }

        let recipient: Recipient = sqlx::query_as(
            r#"
            INSERT INTO users (email, name)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(name)
        .fetch_one(pool)
        .await?;

        tracing::info!(recipient_id = recipient.id, "Recipient created");
        Ok(recipient)
    }

    /// Unread notifications for a recipient, newest first.
    pub async fn list_unread(
        pool: &PgPool,
        recipient_id: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let notifications: Vec<Notification> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1 AND is_read = false
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(recipient_id)
        .fetch_all(pool)
        .await?;

        Ok(notifications)
    }

    /// Get a single notification by ID.
    pub async fn get(pool: &PgPool, notification_id: i64) -> Result<Notification, AppError> {
        let notification: Notification =
            sqlx::query_as("SELECT * FROM notifications WHERE id = $1")
                .bind(notification_id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Notification {} not found", notification_id))
                })?;

        Ok(notification)
    }

    /// Mark a notification as read.
    ///
    /// Idempotent: an already-read notification keeps its original `read_at`
    /// and is returned unchanged. The row is locked for the duration so
    /// concurrent calls agree on one timestamp.
    pub async fn mark_as_read(
        pool: &PgPool,
        notification_id: i64,
    ) -> Result<Notification, AppError> {
        let mut tx = pool.begin().await?;

        let mut notification: Notification =
            sqlx::query_as("SELECT * FROM notifications WHERE id = $1 FOR UPDATE")
                .bind(notification_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Notification {} not found", notification_id))
                })?;

        if notification.is_read() {
            tx.commit().await?;
            return Ok(notification);
        }

        // Postgres keeps microseconds; truncate so the returned value matches
        // what later reads see.
        let read_at = notification.mark_as_read(Utc::now().trunc_subsecs(6));

        sqlx::query("UPDATE notifications SET is_read = true, read_at = $2 WHERE id = $1")
            .bind(notification_id)
            .bind(read_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(notification_id, "Notification marked as read");
        Ok(notification)
    }
}
