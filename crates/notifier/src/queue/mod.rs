//! Queue abstraction between the dispatcher and the workers.
//!
//! A [`TaskQueue`] delivers each task at least once. A delivered task stays in
//! flight until the worker settles it with exactly one of
//! [`TaskQueue::acknowledge`], [`TaskQueue::reschedule`] or
//! [`TaskQueue::dead_letter`]. Tasks left in flight by a crashed worker are
//! handed out again, so the same envelope can be processed twice.
//!
//! Retry timing lives here too ([`RetryPolicy`]); the processor only
//! classifies failures.

pub mod memory;
pub mod redis_queue;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use herald_common::config::AppConfig;

use crate::envelope::NotificationEnvelope;
use crate::error::TransportError;

pub use memory::InMemoryQueue;
pub use redis_queue::RedisQueue;

/// Wire record stored on the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    pub envelope: NotificationEnvelope,
    /// 1 for the first delivery, incremented on every reschedule.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedTask {
    pub fn first(envelope: NotificationEnvelope) -> Self {
        Self {
            envelope,
            attempt: 1,
            enqueued_at: Utc::now(),
        }
    }

    /// The same task, one attempt later.
    pub fn next_attempt(&self) -> Self {
        Self {
            envelope: self.envelope.clone(),
            attempt: self.attempt + 1,
            enqueued_at: self.enqueued_at,
        }
    }
}

/// A task handed to a worker, plus the receipt needed to settle it.
#[derive(Debug, Clone)]
pub struct Delivery {
    task: QueuedTask,
    receipt: String,
}

impl Delivery {
    pub fn new(task: QueuedTask, receipt: String) -> Self {
        Self { task, receipt }
    }

    pub fn task(&self) -> &QueuedTask {
        &self.task
    }

    pub fn envelope(&self) -> &NotificationEnvelope {
        &self.task.envelope
    }

    pub fn attempt(&self) -> u32 {
        self.task.attempt
    }

    /// Adapter-specific handle identifying this delivery.
    pub fn receipt(&self) -> &str {
        &self.receipt
    }
}

/// Terminal record for a task that will never be delivered again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub task: QueuedTask,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Asynchronous, at-least-once task transport.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Accept an envelope for eventual delivery.
    async fn enqueue(&self, envelope: &NotificationEnvelope) -> Result<(), TransportError>;

    /// Claim the next ready task, if any. Does not block waiting for work.
    async fn receive(&self) -> Result<Option<Delivery>, TransportError>;

    /// The task was committed; forget it.
    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), TransportError>;

    /// Deliver the task again after `delay`, with its attempt counter bumped.
    async fn reschedule(&self, delivery: &Delivery, delay: Duration)
    -> Result<(), TransportError>;

    /// Stop delivering the task and keep it for inspection.
    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), TransportError>;

    /// Check that the queue is reachable and accepting work.
    async fn health_check(&self) -> Result<(), TransportError>;
}

/// Exponential backoff with an attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay before redelivering a task whose `attempt`-th delivery failed.
    ///
    /// `None` once `attempt` reaches `max_attempts`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        Some(self.base_delay.saturating_mul(factor).min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}
