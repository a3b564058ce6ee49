//! Redis-backed implementation of [`Store`].
//!
//! Key layout (spec §6):
//! - `task:queue` (FIFO list, `LPUSH` at the head, `RPOP` at the tail).
//! - `task:priority_queue` (sorted set, score 1.0/2.0 for short/long).
//! - `task:retry` (sorted set, score is the Unix-second due time, fractional).
//! - `task:result:<id>` (serialized [`TaskRecord`] with a 7-day rolling TTL).
//! - `rl:<client>:<window>` (rate-limit counter with a 2-minute TTL).

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::error::{StoreError, StoreResult};
use crate::queue::Store;
use crate::record::{JobType, TaskRecord, TASK_TTL_SECONDS};

const FIFO_QUEUE_KEY: &str = "task:queue";
const PRIORITY_QUEUE_KEY: &str = "task:priority_queue";
const RETRY_SET_KEY: &str = "task:retry";
const TASK_RESULT_PREFIX: &str = "task:result:";

fn record_key(id: &str) -> String {
    format!("{TASK_RESULT_PREFIX}{id}")
}

/// Atomically pops due entries from a sorted set: range-by-score followed by
/// remove-by-members, in one round trip. Closes the TOCTOU window that a
/// naive two-call `ZRANGEBYSCORE` + `ZREM` would leave open under multiple
/// concurrent retry schedulers (spec §9).
const RETRY_POP_DUE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
if #due > 0 then
    redis.call('ZREM', KEYS[1], unpack(due))
end
return due
"#;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    retry_pop_due_script: std::sync::Arc<Script>,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            retry_pop_due_script: std::sync::Arc::new(Script::new(RETRY_POP_DUE_SCRIPT)),
        })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn fifo_enqueue(&self, id: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(FIFO_QUEUE_KEY, id).await?;
        Ok(())
    }

    async fn fifo_dequeue(&self) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let id: Option<String> = conn.rpop(FIFO_QUEUE_KEY, None).await?;
        Ok(id)
    }

    async fn fifo_length(&self) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(FIFO_QUEUE_KEY).await?;
        Ok(len)
    }

    async fn priority_enqueue(&self, id: &str, job_type: JobType) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .zadd(PRIORITY_QUEUE_KEY, id, job_type.priority_score())
            .await?;
        Ok(())
    }

    async fn priority_dequeue(&self) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        // ZPOPMIN is atomic: it removes and returns the lowest-score member
        // in one step. Ties fall back to the store's internal member order.
        let popped: Vec<(String, f64)> = conn.zpopmin(PRIORITY_QUEUE_KEY, 1).await?;
        Ok(popped.into_iter().next().map(|(id, _score)| id))
    }

    async fn priority_length(&self) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.zcard(PRIORITY_QUEUE_KEY).await?;
        Ok(len)
    }

    async fn retry_schedule(&self, id: &str, due_at: f64) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.zadd(RETRY_SET_KEY, id, due_at).await?;
        Ok(())
    }

    async fn retry_pop_due(&self, limit: usize, now: f64) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = self
            .retry_pop_due_script
            .key(RETRY_SET_KEY)
            .arg(now)
            .arg(limit)
            .invoke_async(&mut conn)
            .await?;
        Ok(ids)
    }

    async fn record_store(&self, task: &TaskRecord) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let json = task.to_json()?;
        let _: () = conn
            .set_ex(record_key(&task.id), json, TASK_TTL_SECONDS as u64)
            .await?;
        Ok(())
    }

    async fn record_store_if_absent(&self, task: &TaskRecord) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let json = task.to_json()?;
        let opts = redis::SetOptions::default()
            .conditional_set(redis::ExistenceCheck::NX)
            .with_expiration(redis::SetExpiry::EX(TASK_TTL_SECONDS as usize));
        let result: Option<String> = conn.set_options(record_key(&task.id), json, opts).await?;
        Ok(result.is_some())
    }

    async fn record_get(&self, id: &str) -> StoreResult<Option<TaskRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(record_key(id)).await?;
        match raw {
            Some(json) => Ok(Some(TaskRecord::from_json(&json)?)),
            None => Ok(None),
        }
    }

    async fn record_exists(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(record_key(id)).await?;
        Ok(exists)
    }

    async fn record_delete(&self, id: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(record_key(id)).await?;
        Ok(())
    }

    async fn reenqueue_by_type(&self, id: &str) -> StoreResult<()> {
        let task = self
            .record_get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        // `JobType` is exhaustively {Short, Long}, both of which route to the
        // priority queue; a FIFO fallback for "any other value" would go
        // here if the record model ever admitted one.
        self.priority_enqueue(id, task.job_type).await
    }

    async fn rate_limit_incr(&self, key: &str, ttl_seconds: i64) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(key, 1).await?;
        if count == 1 {
            let _: bool = conn.expire(key, ttl_seconds).await?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{JobType, Status, TaskRecord};

    async fn connect() -> Option<RedisStore> {
        RedisStore::connect("redis://localhost:6379").await.ok()
    }

    #[tokio::test]
    async fn fifo_round_trips_through_a_real_store() {
        let Some(store) = connect().await else {
            // Redis is not available in the test environment; skip gracefully.
            return;
        };

        let id = uuid_like("fifo-roundtrip");
        store.fifo_enqueue(&id).await.unwrap();
        let popped = store.fifo_dequeue().await.unwrap();
        assert_eq!(popped, Some(id));
    }

    #[tokio::test]
    async fn record_store_if_absent_only_writes_once() {
        let Some(store) = connect().await else {
            return;
        };

        let id = uuid_like("toctou");
        let task = TaskRecord::new(id.clone(), JobType::Short, "p".into());
        let mut other = task.clone();
        other.status = Status::Running;

        let first = store.record_store_if_absent(&task).await.unwrap();
        let second = store.record_store_if_absent(&other).await.unwrap();
        let stored = store.record_get(&id).await.unwrap().unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(stored.status, Status::Queued);

        store.record_delete(&id).await.unwrap();
    }

    fn uuid_like(prefix: &str) -> String {
        format!("{prefix}-{}", std::process::id())
    }
}
