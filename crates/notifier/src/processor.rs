//! Task processor: turns one envelope into one committed notification.
//!
//! Every failure is classified, never propagated:
//! 1. Empty title → permanent → `Discarded`
//! 2. Unknown recipient → permanent → `Discarded`
//! 3. Any store failure → transient → `RetryRequested`
//! 4. Insert committed → `Committed`
//!
//! Nothing is written before the final commit, so the `Discarded` and
//! `RetryRequested` paths leave the store untouched.

use std::sync::Arc;

use chrono::Utc;

use herald_common::types::{NewNotification, Notification, Recipient};

use crate::envelope::NotificationEnvelope;
use crate::error::ProcessingError;
use crate::store::NotificationStore;

/// Result of handling one envelope. The queue acts on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// The notification exists; acknowledge the delivery.
    Committed { notification_id: i64 },
    /// Transient failure; deliver again later.
    RetryRequested { reason: String },
    /// Permanent failure; never deliver again.
    Discarded { reason: String },
}

impl ProcessingOutcome {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Committed { .. } => "committed",
            Self::RetryRequested { .. } => "retry_requested",
            Self::Discarded { .. } => "discarded",
        }
    }
}

/// Consumes envelopes and writes notifications through a [`NotificationStore`].
#[derive(Clone)]
pub struct NotificationProcessor {
    store: Arc<dyn NotificationStore>,
}

impl NotificationProcessor {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Handle one envelope and classify the result.
    pub async fn handle(&self, envelope: &NotificationEnvelope) -> ProcessingOutcome {
        match self.create(envelope).await {
            Ok(notification) => {
                tracing::info!(
                    task_id = %envelope.id(),
                    recipient_id = envelope.recipient_id(),
                    notification_id = notification.id,
                    "Notification created"
                );
                ProcessingOutcome::Committed {
                    notification_id: notification.id,
                }
            }
            Err(e) if e.is_permanent() => {
                tracing::warn!(
                    task_id = %envelope.id(),
                    recipient_id = envelope.recipient_id(),
                    error = %e,
                    "Discarding notification task"
                );
                ProcessingOutcome::Discarded {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                tracing::warn!(
                    task_id = %envelope.id(),
                    recipient_id = envelope.recipient_id(),
                    error = %e,
                    "Notification task failed, requesting retry"
                );
                ProcessingOutcome::RetryRequested {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn create(
        &self,
        envelope: &NotificationEnvelope,
    ) -> Result<Notification, ProcessingError> {
        if envelope.title().trim().is_empty() {
            return Err(ProcessingError::InvalidEnvelope(
                "title must not be empty".to_string(),
            ));
        }

        let recipient = self
            .store
            .find_recipient(envelope.recipient_id())
            .await?
            .ok_or(ProcessingError::RecipientNotFound(envelope.recipient_id()))?;

        let notification = self
            .store
            .create_notification(&Self::build(envelope, &recipient))
            .await?;

        Ok(notification)
    }

    /// Copy the envelope's content onto a new row owned by `recipient`.
    fn build(envelope: &NotificationEnvelope, recipient: &Recipient) -> NewNotification {
        NewNotification {
            recipient_id: recipient.id,
            title: envelope.title().to_string(),
            body: envelope.body().to_string(),
            url: envelope.url().map(str::to_string),
            created_at: Utc::now(),
        }
    }
}
