//! In-process queue. Used by tests and single-process setups; state is lost
//! when the process exits.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::envelope::NotificationEnvelope;
use crate::error::TransportError;

use super::{DeadLetter, Delivery, QueuedTask, TaskQueue};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedTask>,
    delayed: Vec<(Instant, QueuedTask)>,
    in_flight: HashMap<String, QueuedTask>,
    dead: Vec<DeadLetter>,
    closed: bool,
}

impl QueueState {
    fn promote_due(&mut self) {
        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) =
            self.delayed.drain(..).partition(|(ready_at, _)| *ready_at <= now);
        self.delayed = later;
        self.pending.extend(due.into_iter().map(|(_, task)| task));
    }

    fn take_in_flight(&mut self, delivery: &Delivery) -> Option<QueuedTask> {
        let task = self.in_flight.remove(delivery.receipt());
        if task.is_none() {
            tracing::debug!(
                task_id = %delivery.envelope().id(),
                "Delivery already settled"
            );
        }
        task
    }
}

/// [`TaskQueue`] kept in memory behind an async mutex.
#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse further enqueues, as an unreachable broker would.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
    }

    /// Put every in-flight task back on the ready list, as happens after a
    /// worker crash. Returns how many tasks were recovered.
    pub async fn recover_in_flight(&self) -> usize {
        let mut state = self.state.lock().await;
        let recovered: Vec<QueuedTask> = state.in_flight.drain().map(|(_, task)| task).collect();
        let count = recovered.len();
        state.pending.extend(recovered);
        count
    }

    /// Tasks ready for delivery now.
    pub async fn pending_len(&self) -> usize {
        let mut state = self.state.lock().await;
        state.promote_due();
        state.pending.len()
    }

    /// Tasks waiting for their retry delay to pass.
    pub async fn delayed_len(&self) -> usize {
        self.state.lock().await.delayed.len()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead.clone()
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn enqueue(&self, envelope: &NotificationEnvelope) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed("in-memory queue is closed".to_string()));
        }
        state.pending.push_back(QueuedTask::first(envelope.clone()));
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, TransportError> {
        let mut state = self.state.lock().await;
        state.promote_due();

        let Some(task) = state.pending.pop_front() else {
            return Ok(None);
        };

        let receipt = Uuid::new_v4().to_string();
        state.in_flight.insert(receipt.clone(), task.clone());
        Ok(Some(Delivery::new(task, receipt)))
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), TransportError> {
        self.state.lock().await.take_in_flight(delivery);
        Ok(())
    }

    async fn reschedule(
        &self,
        delivery: &Delivery,
        delay: Duration,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.take_in_flight(delivery) {
            let next = task.next_attempt();
            if delay.is_zero() {
                state.pending.push_back(next);
            } else {
                state.delayed.push((Instant::now() + delay, next));
            }
        }
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.take_in_flight(delivery) {
            state.dead.push(DeadLetter {
                task,
                reason: reason.to_string(),
                failed_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        if self.state.lock().await.closed {
            return Err(TransportError::Closed("in-memory queue is closed".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> NotificationEnvelope {
        NotificationEnvelope::new(7, "A", "B", None)
    }

    #[tokio::test]
    async fn test_enqueue_then_receive() {
        let queue = InMemoryQueue::new();
        let env = envelope();
        queue.enqueue(&env).await.unwrap();

        let delivery = queue.receive().await.unwrap().unwrap();
        assert_eq!(delivery.envelope().id(), env.id());
        assert_eq!(delivery.attempt(), 1);
        assert_eq!(queue.in_flight_len().await, 1);
        assert!(queue.receive().await.unwrap().is_none());

        queue.acknowledge(&delivery).await.unwrap();
        assert_eq!(queue.in_flight_len().await, 0);
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_enqueue() {
        let queue = InMemoryQueue::new();
        queue.close().await;
        let err = queue.enqueue(&envelope()).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed(_)));
        assert_eq!(queue.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_health_check_follows_close() {
        let queue = InMemoryQueue::new();
        assert!(queue.health_check().await.is_ok());

        queue.close().await;
        let err = queue.health_check().await.unwrap_err();
        assert!(matches!(err, TransportError::Closed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_waits_for_delay() {
        let queue = InMemoryQueue::new();
        queue.enqueue(&envelope()).await.unwrap();
        let delivery = queue.receive().await.unwrap().unwrap();

        queue
            .reschedule(&delivery, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(queue.delayed_len().await, 1);
        assert!(queue.receive().await.unwrap().is_none());

        tokio::time::advance(Duration::from_secs(3)).await;

        let again = queue.receive().await.unwrap().unwrap();
        assert_eq!(again.attempt(), 2);
        assert_eq!(again.envelope().id(), delivery.envelope().id());
    }

    #[tokio::test]
    async fn test_dead_letter_is_not_redelivered() {
        let queue = InMemoryQueue::new();
        queue.enqueue(&envelope()).await.unwrap();
        let delivery = queue.receive().await.unwrap().unwrap();

        queue.dead_letter(&delivery, "gone").await.unwrap();

        assert!(queue.receive().await.unwrap().is_none());
        let dead = queue.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, "gone");
        assert_eq!(dead[0].task.envelope.id(), delivery.envelope().id());
    }

    #[tokio::test]
    async fn test_recover_in_flight_redelivers() {
        let queue = InMemoryQueue::new();
        queue.enqueue(&envelope()).await.unwrap();
        let first = queue.receive().await.unwrap().unwrap();

        assert_eq!(queue.recover_in_flight().await, 1);
        let second = queue.receive().await.unwrap().unwrap();
        assert_eq!(first.envelope().id(), second.envelope().id());
        assert_ne!(first.receipt(), second.receipt());

        // Settling the stale delivery is a no-op.
        queue.acknowledge(&first).await.unwrap();
        assert_eq!(queue.in_flight_len().await, 1);
    }
}
