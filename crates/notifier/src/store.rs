//! Record store used by the task processor.

use async_trait::async_trait;
use sqlx::PgPool;

use herald_common::types::{NewNotification, Notification, Recipient};

use crate::error::StoreError;

/// What the processor needs from persistent storage.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Look up a recipient. `Ok(None)` means it does not exist.
    async fn find_recipient(&self, id: i64) -> Result<Option<Recipient>, StoreError>;

    /// Insert and commit one notification. All-or-nothing.
    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, StoreError>;
}

/// PostgreSQL implementation.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn find_recipient(&self, id: i64) -> Result<Option<Recipient>, StoreError> {
        let recipient: Option<Recipient> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(recipient)
    }

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, StoreError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO notifications (recipient_id, title, body, url, created_at, is_read)
            VALUES ($1, $2, $3, $4, $5, false)
            RETURNING id
            "#,
        )
        .bind(notification.recipient_id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.url.as_deref())
        .bind(notification.created_at)
        .fetch_one(&mut *tx)
        .await?;

        // Dropping `tx` on an error above rolls the insert back.
        tx.commit().await?;

        Ok(notification.clone().into_notification(id))
    }
}
