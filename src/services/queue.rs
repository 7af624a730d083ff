use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{Delivery, Job};

const PENDING_KEY: &str = "image_labeler:jobs";
const IN_FLIGHT_KEY: &str = "image_labeler:in_flight";
const DEAD_KEY: &str = "image_labeler:dead";

/// How long a received, unacknowledged delivery stays hidden from other
/// consumers before it becomes receivable again.
pub const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on how long an empty `receive` call long-polls before
/// returning an empty batch.
pub const RECEIVE_WAIT: Duration = Duration::from_secs(20);

/// Total deliveries a job gets (one initial + two redeliveries) before it is
/// moved to the dead-letter queue.
pub const MAX_DELIVERIES: u32 = 3;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// At-least-once work queue of labeling jobs with a companion dead-letter
/// queue.
///
/// Delivery is unordered and duplicates are possible; consumers must process
/// idempotently. The queue is the single source of truth for outstanding
/// work; no consumer holds queue state across restarts.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError>;

    /// Returns 0..`max` deliveries. Each delivery is invisible to other
    /// consumers for [`VISIBILITY_TIMEOUT`]; a delivery that is not
    /// acknowledged in that window is redelivered, or dead-lettered once it
    /// has used up [`MAX_DELIVERIES`]. Long-polls up to [`RECEIVE_WAIT`]
    /// when the queue is empty.
    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError>;

    /// Permanently removes a delivered job. Only called after processing
    /// fully succeeded.
    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Number of jobs waiting for delivery.
    async fn depth(&self) -> Result<u64, QueueError>;

    /// Jobs that exhausted their delivery budget. Terminal; operator
    /// intervention required.
    async fn dead_letters(&self) -> Result<Vec<Job>, QueueError>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<(), QueueError>;
}

/// Wire envelope for a queued job. The `id` keeps two jobs for the same key
/// distinct inside the in-flight set.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    id: Uuid,
    #[serde(flatten)]
    job: Job,
}

/// Redis-backed [`WorkQueue`].
///
/// Pending jobs live in a list, in-flight deliveries in a sorted set scored
/// by their visibility deadline (epoch millis), dead letters in a separate
/// list. Expired in-flight entries are reaped on every receive: back to the
/// pending list while the delivery budget lasts, to the dead list after.
pub struct RedisWorkQueue {
    client: redis::Client,
}

impl RedisWorkQueue {
    pub fn new(redis_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self { client })
    }

    /// Reap in-flight entries whose visibility deadline has passed.
    async fn redeliver_expired(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
    ) -> Result<(), QueueError> {
        let now = Utc::now().timestamp_millis();
        let expired: Vec<String> = conn
            .zrangebyscore(IN_FLIGHT_KEY, "-inf", now)
            .await
            .map_err(QueueError::Redis)?;

        for member in expired {
            // Another consumer may reap concurrently; whoever removes the
            // member owns the redelivery.
            let removed: i64 = conn
                .zrem(IN_FLIGHT_KEY, &member)
                .await
                .map_err(QueueError::Redis)?;
            if removed == 0 {
                continue;
            }

            let envelope: Envelope =
                serde_json::from_str(&member).map_err(QueueError::Serialize)?;

            if envelope.job.delivery_attempt >= MAX_DELIVERIES {
                tracing::warn!(
                    source_key = %envelope.job.source_key,
                    attempts = envelope.job.delivery_attempt,
                    "Delivery budget exhausted, moving job to dead-letter queue"
                );
                conn.lpush::<_, _, ()>(DEAD_KEY, &member)
                    .await
                    .map_err(QueueError::Redis)?;
            } else {
                conn.lpush::<_, _, ()>(PENDING_KEY, &member)
                    .await
                    .map_err(QueueError::Redis)?;
            }
        }

        Ok(())
    }

    /// Pop up to `max` pending jobs into the in-flight set.
    async fn pop_batch(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        max: usize,
    ) -> Result<Vec<Delivery>, QueueError> {
        let mut batch = Vec::new();

        while batch.len() < max {
            let payload: Option<String> =
                conn.rpop(PENDING_KEY, None).await.map_err(QueueError::Redis)?;
            let Some(payload) = payload else { break };

            let mut envelope: Envelope =
                serde_json::from_str(&payload).map_err(QueueError::Serialize)?;
            envelope.job.delivery_attempt += 1;

            let member = serde_json::to_string(&envelope).map_err(QueueError::Serialize)?;
            let deadline =
                Utc::now().timestamp_millis() + VISIBILITY_TIMEOUT.as_millis() as i64;

            conn.zadd::<_, _, _, ()>(IN_FLIGHT_KEY, &member, deadline)
                .await
                .map_err(QueueError::Redis)?;

            batch.push(Delivery {
                receipt: member,
                job: envelope.job,
            });
        }

        Ok(batch)
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        let envelope = Envelope {
            id: Uuid::new_v4(),
            job,
        };
        let payload = serde_json::to_string(&envelope).map_err(QueueError::Serialize)?;
        conn.lpush::<_, _, ()>(PENDING_KEY, &payload)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        let started = std::time::Instant::now();
        loop {
            self.redeliver_expired(&mut conn).await?;

            let batch = self.pop_batch(&mut conn, max).await?;
            if !batch.is_empty() || started.elapsed() >= RECEIVE_WAIT {
                return Ok(batch);
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        conn.zrem::<_, _, ()>(IN_FLIGHT_KEY, &delivery.receipt)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        let depth: u64 = conn.llen(PENDING_KEY).await.map_err(QueueError::Redis)?;
        Ok(depth)
    }

    async fn dead_letters(&self) -> Result<Vec<Job>, QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        let members: Vec<String> = conn
            .lrange(DEAD_KEY, 0, -1)
            .await
            .map_err(QueueError::Redis)?;

        members
            .iter()
            .map(|m| {
                serde_json::from_str::<Envelope>(m)
                    .map(|e| e.job)
                    .map_err(QueueError::Serialize)
            })
            .collect()
    }

    async fn ping(&self) -> Result<(), QueueError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(QueueError::Redis)?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(QueueError::Redis)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
