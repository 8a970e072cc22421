//! Task envelope: one immutable unit of notification work.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Description of a notification to create, as it travels through the queue.
///
/// Fields are private and there are no setters, so an envelope never changes
/// after construction. Two envelopes with identical content are still two
/// distinct tasks; `id` tells them apart in logs and dead letters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    id: Uuid,
    recipient_id: i64,
    title: String,
    body: String,
    #[serde(default)]
    url: Option<String>,
}

impl NotificationEnvelope {
    pub fn new(
        recipient_id: i64,
        title: impl Into<String>,
        body: impl Into<String>,
        url: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            title: title.into(),
            body: body.into(),
            url,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn recipient_id(&self) -> i64 {
        self.recipient_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assigns_distinct_ids() {
        let a = NotificationEnvelope::new(7, "A", "B", None);
        let b = NotificationEnvelope::new(7, "A", "B", None);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.title(), b.title());
    }

    #[test]
    fn test_absent_url_serializes_as_null() {
        let envelope = NotificationEnvelope::new(7, "Test", "hi", None);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["recipient_id"], 7);
        assert_eq!(json["title"], "Test");
        assert_eq!(json["body"], "hi");
        assert!(json["url"].is_null());
        assert!(json["id"].is_string());
    }

    #[test]
    fn test_empty_url_is_not_absent_url() {
        let empty = NotificationEnvelope::new(7, "Test", "hi", Some(String::new()));
        assert_eq!(empty.url(), Some(""));

        let json = serde_json::to_value(&empty).unwrap();
        assert_eq!(json["url"], "");
    }

    #[test]
    fn test_missing_url_key_deserializes_as_none() {
        let json = serde_json::json!({
            "id": "6f1c3a2e-0a51-4f55-9a4e-5f3b8c0b2d11",
            "recipient_id": 999,
            "title": "x",
            "body": "y"
        });
        let envelope: NotificationEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(envelope.recipient_id(), 999);
        assert!(envelope.url().is_none());
    }
}
