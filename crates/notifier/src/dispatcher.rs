//! Producer side: wrap a request in an envelope and hand it to the queue.

use std::sync::Arc;

use uuid::Uuid;

use crate::envelope::NotificationEnvelope;
use crate::error::TransportError;
use crate::queue::TaskQueue;

/// Fire-and-forget notification dispatcher.
#[derive(Clone)]
pub struct Notifier {
    queue: Arc<dyn TaskQueue>,
}

impl Notifier {
    pub fn new(queue: Arc<dyn TaskQueue>) -> Self {
        Self { queue }
    }

    /// Queue a notification for `recipient_id`.
    ///
    /// Returns the task id once the queue has accepted the envelope. Success
    /// means "will be processed eventually", not "the notification exists";
    /// the recipient is not checked here. The only error is a transport failure.
    pub async fn notify(
        &self,
        recipient_id: i64,
        title: impl Into<String>,
        body: impl Into<String>,
        url: Option<String>,
    ) -> Result<Uuid, TransportError> {
        let envelope = NotificationEnvelope::new(recipient_id, title, body, url);

        self.queue.enqueue(&envelope).await.inspect_err(|e| {
            tracing::error!(
                task_id = %envelope.id(),
                recipient_id,
                error = %e,
                "Failed to enqueue notification"
            );
        })?;

        tracing::debug!(task_id = %envelope.id(), recipient_id, "Notification queued");
        Ok(envelope.id())
    }

    /// Whether the underlying queue is reachable.
    pub async fn check_queue(&self) -> Result<(), TransportError> {
        self.queue.health_check().await
    }
}
