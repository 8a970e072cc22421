//! Redis-backed queue.
//!
//! Keys under `<prefix>`:
//! - `:pending`    list of ready payloads (LPUSH in, consumed from the right)
//! - `:processing` list of claimed payloads; the payload itself is the receipt
//! - `:delayed`    sorted set of rescheduled payloads, scored by due time (ms)
//! - `:dead`       list of dead-letter records
//!
//! Claiming uses `LMOVE pending processing`, so a worker that dies mid-task
//! leaves the payload in `:processing` until [`RedisQueue::recover_in_flight`]
//! puts it back.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::Script;
use redis::aio::ConnectionManager;

use crate::envelope::NotificationEnvelope;
use crate::error::TransportError;

use super::{DeadLetter, Delivery, QueuedTask, TaskQueue};

/// Maximum number of due retries moved back to `:pending` per `receive`.
const PROMOTE_BATCH: usize = 100;

/// KEYS[1] = delayed, KEYS[2] = pending, ARGV[1] = now (ms), ARGV[2] = batch.
const PROMOTE_DUE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, payload in ipairs(due) do
    redis.call('ZREM', KEYS[1], payload)
    redis.call('LPUSH', KEYS[2], payload)
end
return #due
"#;

/// [`TaskQueue`] over Redis lists.
#[derive(Clone)]
pub struct RedisQueue {
    redis: ConnectionManager,
    keys: QueueKeys,
    promote_script: Script,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueKeys {
    pending: String,
    processing: String,
    delayed: String,
    dead: String,
}

impl QueueKeys {
    fn new(prefix: &str) -> Self {
        Self {
            pending: format!("{prefix}:pending"),
            processing: format!("{prefix}:processing"),
            delayed: format!("{prefix}:delayed"),
            dead: format!("{prefix}:dead"),
        }
    }
}

impl RedisQueue {
    pub fn new(redis: ConnectionManager, prefix: &str) -> Self {
        Self {
            redis,
            keys: QueueKeys::new(prefix),
            promote_script: Script::new(PROMOTE_DUE_SCRIPT),
        }
    }

    /// Move every payload left in `:processing` back to `:pending`.
    ///
    /// Call once at worker start-up, before any worker is claiming tasks.
    pub async fn recover_in_flight(&self) -> Result<usize, TransportError> {
        let mut conn = self.redis.clone();
        let mut recovered = 0;

        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.keys.processing)
                .arg(&self.keys.pending)
                .arg("RIGHT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }

        if recovered > 0 {
            tracing::warn!(recovered, "Recovered in-flight tasks from previous run");
        }
        Ok(recovered)
    }

    /// Number of dead-lettered records.
    pub async fn dead_letter_len(&self) -> Result<usize, TransportError> {
        let mut conn = self.redis.clone();
        let len: usize = redis::cmd("LLEN")
            .arg(&self.keys.dead)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    /// Move retries whose delay has passed back to `:pending`.
    ///
    /// Runs as one script so a payload is never out of both `:delayed` and
    /// `:pending` at the same time.
    async fn promote_due(&self, conn: &mut ConnectionManager) -> Result<(), TransportError> {
        let now_ms = Utc::now().timestamp_millis();
        let promoted: usize = self
            .promote_script
            .key(&self.keys.delayed)
            .key(&self.keys.pending)
            .arg(now_ms)
            .arg(PROMOTE_BATCH)
            .invoke_async(conn)
            .await?;

        if promoted > 0 {
            tracing::debug!(promoted, "Promoted due retries");
        }
        Ok(())
    }

    /// Drop a payload that cannot be decoded straight into `:dead`.
    async fn bury_undecodable(
        &self,
        conn: &mut ConnectionManager,
        payload: &str,
        error: &serde_json::Error,
    ) -> Result<(), TransportError> {
        tracing::error!(error = %error, "Undecodable queue payload, dead-lettering");

        let record = serde_json::json!({
            "raw": payload,
            "reason": format!("undecodable payload: {error}"),
            "failed_at": Utc::now(),
        });
        let _: () = redis::pipe()
            .atomic()
            .cmd("LREM")
            .arg(&self.keys.processing)
            .arg(1)
            .arg(payload)
            .ignore()
            .cmd("LPUSH")
            .arg(&self.keys.dead)
            .arg(record.to_string())
            .ignore()
            .query_async(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for RedisQueue {
    async fn enqueue(&self, envelope: &NotificationEnvelope) -> Result<(), TransportError> {
        let payload = serde_json::to_string(&QueuedTask::first(envelope.clone()))?;
        let mut conn = self.redis.clone();
        let _: () = redis::cmd("LPUSH")
            .arg(&self.keys.pending)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, TransportError> {
        let mut conn = self.redis.clone();
        self.promote_due(&mut conn).await?;

        loop {
            let payload: Option<String> = redis::cmd("LMOVE")
                .arg(&self.keys.pending)
                .arg(&self.keys.processing)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;

            let Some(payload) = payload else {
                return Ok(None);
            };

            match serde_json::from_str::<QueuedTask>(&payload) {
                Ok(task) => return Ok(Some(Delivery::new(task, payload))),
                Err(e) => self.bury_undecodable(&mut conn, &payload, &e).await?,
            }
        }
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), TransportError> {
        let mut conn = self.redis.clone();
        let _: () = redis::cmd("LREM")
            .arg(&self.keys.processing)
            .arg(1)
            .arg(delivery.receipt())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn reschedule(
        &self,
        delivery: &Delivery,
        delay: Duration,
    ) -> Result<(), TransportError> {
        let next = serde_json::to_string(&delivery.task().next_attempt())?;
        let delay_ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        let due_ms = Utc::now().timestamp_millis().saturating_add(delay_ms);

        let mut conn = self.redis.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("LREM")
            .arg(&self.keys.processing)
            .arg(1)
            .arg(delivery.receipt())
            .ignore()
            .cmd("ZADD")
            .arg(&self.keys.delayed)
            .arg(due_ms)
            .arg(next)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> Result<(), TransportError> {
        let record = serde_json::to_string(&DeadLetter {
            task: delivery.task().clone(),
            reason: reason.to_string(),
            failed_at: Utc::now(),
        })?;

        let mut conn = self.redis.clone();
        let _: () = redis::pipe()
            .atomic()
            .cmd("LREM")
            .arg(&self.keys.processing)
            .arg(1)
            .arg(delivery.receipt())
            .ignore()
            .cmd("LPUSH")
            .arg(&self.keys.dead)
            .arg(record)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
