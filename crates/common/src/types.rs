use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user who can receive notifications.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipient {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted in-app notification.
///
/// `read_at` is set if and only if `is_read` is true. Both fields are private
/// so the only way to change them is [`Notification::mark_as_read`]. Rows come
/// from the database (`FromRow`); the type is serialize-only.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    /// Owning recipient. Back-reference only; the recipient row does not
    /// manage the notification's lifecycle.
    pub recipient_id: i64,
    pub title: String,
    pub body: String,
    /// Optional deep link. `None` means "no link", never an empty string.
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Build an unread notification as returned by the store after insert.
    pub fn unread(
        id: i64,
        recipient_id: i64,
        title: String,
        body: String,
        url: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            recipient_id,
            title,
            body,
            url,
            created_at,
            is_read: false,
            read_at: None,
        }
    }

    pub fn is_read(&self) -> bool {
        self.is_read
    }

    pub fn read_at(&self) -> Option<DateTime<Utc>> {
        self.read_at
    }

    /// Mark the notification as read at `now`.
    ///
    /// Idempotent: a second call keeps the first timestamp and returns it.
    pub fn mark_as_read(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.read_at {
            Some(read_at) => read_at,
            None => {
                self.is_read = true;
                self.read_at = Some(now);
                now
            }
        }
    }
}

/// Fields of a notification about to be inserted. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: i64,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    /// Materialize the row the store would return for this insert.
    pub fn into_notification(self, id: i64) -> Notification {
        Notification::unread(
            id,
            self.recipient_id,
            self.title,
            self.body,
            self.url,
            self.created_at,
        )
    }
}
