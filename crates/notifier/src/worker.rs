//! Consumer loop: receive → handle → settle.
//!
//! The worker owns the retry decision on the queue side. The processor says
//! *whether* a task may be retried; the worker's [`RetryPolicy`] says *when*,
//! and how many times before the task is dead-lettered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::envelope::NotificationEnvelope;
use crate::error::TransportError;
use crate::processor::{NotificationProcessor, ProcessingOutcome};
use crate::queue::{Delivery, RetryPolicy, TaskQueue};

/// One queue consumer. Several may run against the same queue.
pub struct Worker {
    id: usize,
    queue: Arc<dyn TaskQueue>,
    processor: NotificationProcessor,
    policy: RetryPolicy,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: Arc<dyn TaskQueue>,
        processor: NotificationProcessor,
        policy: RetryPolicy,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id,
            queue,
            processor,
            policy,
            poll_interval,
        }
    }

    /// Consume until `shutdown` turns true or its sender is dropped.
    ///
    /// A task already being handled is finished and settled before exiting.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            worker = self.id,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Worker started"
        );

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            let idle = match self.process_next().await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    tracing::warn!(worker = self.id, error = %e, "Queue transport error");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!(worker = self.id, "Worker stopped");
    }

    /// Take one task from the queue, process it and settle the delivery.
    ///
    /// Returns `Ok(None)` when nothing was ready.
    pub async fn process_next(&self) -> Result<Option<ProcessingOutcome>, TransportError> {
        let Some(delivery) = self.queue.receive().await? else {
            return Ok(None);
        };

        let outcome = self.handle_isolated(delivery.envelope()).await;
        self.settle(&delivery, &outcome).await?;

        Ok(Some(outcome))
    }

    /// Run the processor on its own task so a panic in a store adapter
    /// becomes a retry instead of taking the worker down.
    async fn handle_isolated(&self, envelope: &NotificationEnvelope) -> ProcessingOutcome {
        let processor = self.processor.clone();
        let envelope = envelope.clone();
        let task_id = envelope.id();

        match tokio::spawn(async move { processor.handle(&envelope).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    worker = self.id,
                    task_id = %task_id,
                    error = %e,
                    "Notification handler aborted"
                );
                ProcessingOutcome::RetryRequested {
                    reason: format!("handler aborted: {e}"),
                }
            }
        }
    }

    async fn settle(
        &self,
        delivery: &Delivery,
        outcome: &ProcessingOutcome,
    ) -> Result<(), TransportError> {
        let task_id = delivery.envelope().id();
        let attempt = delivery.attempt();

        match outcome {
            ProcessingOutcome::Committed { .. } => self.queue.acknowledge(delivery).await,
            ProcessingOutcome::Discarded { reason } => {
                self.queue.dead_letter(delivery, reason).await
            }
            ProcessingOutcome::RetryRequested { reason } => match self.policy.next_delay(attempt) {
                Some(delay) => {
                    tracing::info!(
                        worker = self.id,
                        task_id = %task_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rescheduling notification task"
                    );
                    self.queue.reschedule(delivery, delay).await
                }
                None => {
                    tracing::error!(
                        worker = self.id,
                        task_id = %task_id,
                        attempt,
                        reason = %reason,
                        "Retries exhausted, dead-lettering notification task"
                    );
                    let reason = format!("retries exhausted after {attempt} attempts: {reason}");
                    self.queue.dead_letter(delivery, &reason).await
                }
            },
        }
    }
}
