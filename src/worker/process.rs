//! Task execution and failure classification (spec §4.5).

use chrono::Utc;
use rand::Rng;
use store::{JobType, Status, Store, TaskRecord, MAX_RETRIES};
use tracing::{info, warn};

use crate::metrics::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    Simple,
    Retry,
}

impl WorkerMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "simple" => Some(WorkerMode::Simple),
            "retry" => Some(WorkerMode::Retry),
            _ => None,
        }
    }
}

const PERMANENT_FAILURE_RATE: f64 = 0.05;
const TRANSIENT_FAILURE_RATE: f64 = 0.25; // cumulative threshold: [0.05, 0.25)

fn simulated_work_duration(job_type: JobType) -> std::time::Duration {
    match job_type {
        JobType::Short => std::time::Duration::from_millis(50),
        JobType::Long => std::time::Duration::from_secs(3),
    }
}

/// Runs one execution attempt of `task` to completion: transitions it to
/// `running`, sleeps to simulate work, classifies a failure if `mode` is
/// `Retry`, and stores the resulting terminal/retry state.
pub async fn process(
    store: &dyn Store,
    metrics: &Metrics,
    mut task: TaskRecord,
    mode: WorkerMode,
    base_backoff_ms: u64,
) -> store::StoreResult<()> {
    task.status = Status::Running;
    task.started_at = Some(Utc::now());
    store.record_store(&task).await?;

    tokio::time::sleep(simulated_work_duration(task.job_type)).await;

    if mode == WorkerMode::Retry {
        let u: f64 = rand::thread_rng().gen_range(0.0..1.0);
        if u < PERMANENT_FAILURE_RATE {
            finalize_failed(store, metrics, &mut task, "permanent error").await?;
            return Ok(());
        } else if u < TRANSIENT_FAILURE_RATE {
            handle_transient(store, metrics, &mut task, base_backoff_ms).await?;
            return Ok(());
        }
    }

    task.status = Status::Success;
    task.completed_at = Some(Utc::now());
    task.result = "Task completed successfully".to_string();
    store.record_store(&task).await?;
    metrics.tasks_finalized.with_label_values(&["success"]).inc();
    info!(task_id = %task.id, retry_count = task.retry_count, "task succeeded");
    Ok(())
}

async fn finalize_failed(
    store: &dyn Store,
    metrics: &Metrics,
    task: &mut TaskRecord,
    reason: &str,
) -> store::StoreResult<()> {
    task.status = Status::Failed;
    task.completed_at = Some(Utc::now());
    task.error = reason.to_string();
    store.record_store(task).await?;
    metrics.tasks_finalized.with_label_values(&["failed"]).inc();
    warn!(task_id = %task.id, reason, "task failed");
    Ok(())
}

async fn handle_transient(
    store: &dyn Store,
    metrics: &Metrics,
    task: &mut TaskRecord,
    base_backoff_ms: u64,
) -> store::StoreResult<()> {
    task.retry_count += 1;

    if task.retry_count > MAX_RETRIES {
        finalize_failed(store, metrics, task, "exhausted retries").await?;
        return Ok(());
    }

    let (delay, next_retry_at) = schedule_retry_delay(task.retry_count, base_backoff_ms);

    // Distinct from `running`: the task isn't executing, it's waiting out a
    // backoff. See the open-question decision in SPEC_FULL.md §9.
    task.status = Status::Retrying;
    store.record_store(task).await?;

    if let Err(err) = store.retry_schedule(&task.id, next_retry_at).await {
        warn!(task_id = %task.id, %err, "retry_schedule failed, falling back to immediate re-enqueue");
        store.reenqueue_by_type(&task.id).await?;
    } else {
        metrics.retries_scheduled.inc();
    }

    info!(task_id = %task.id, retry_count = task.retry_count, delay_ms = delay.as_millis() as u64, "scheduled retry");
    Ok(())
}

/// Exponential backoff with jitter: `base * 2^(retry_count-1) + U[0, that/2)`.
/// Returns the computed delay and the absolute due time, as Unix seconds
/// with fractional precision (the retry set's score is an `f64`, and the
/// first few backoff tiers are sub-second; flooring to whole seconds would
/// make them due immediately).
fn schedule_retry_delay(retry_count: u32, base_backoff_ms: u64) -> (std::time::Duration, f64) {
    let backoff_ms = base_backoff_ms * 2u64.pow(retry_count - 1);
    let jitter_ms: u64 = rand::thread_rng().gen_range(0..(backoff_ms / 2).max(1));
    let delay = std::time::Duration::from_millis(backoff_ms + jitter_ms);
    let next_retry_at = unix_seconds_now() + delay.as_secs_f64();
    (delay, next_retry_at)
}

/// Current time as Unix seconds with fractional precision.
pub(crate) fn unix_seconds_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MockStore;

    fn task() -> TaskRecord {
        TaskRecord::new("t1".into(), JobType::Short, "payload".into())
    }

    #[tokio::test]
    async fn simple_mode_always_succeeds() {
        let mut mock = MockStore::new();
        mock.expect_record_store().times(2).returning(|_| Ok(()));
        let metrics = Metrics::new();

        process(&mock, &metrics, task(), WorkerMode::Simple, 200)
            .await
            .unwrap();
    }

    #[test]
    fn backoff_delays_fall_in_the_documented_window() {
        for retry_count in 1..=5u32 {
            let (delay, _) = schedule_retry_delay(retry_count, 200);
            let lower = 200u128 * 2u128.pow(retry_count - 1);
            let upper = lower * 3 / 2; // 1.5x
            let ms = delay.as_millis();
            assert!(
                ms >= lower && ms < upper,
                "retry {retry_count}: {ms}ms not in [{lower}, {upper})"
            );
        }
    }

    #[tokio::test]
    async fn exhausting_retries_finalizes_as_failed_with_retry_count_six() {
        let mut mock = MockStore::new();
        let stored = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let stored_clone = stored.clone();
        mock.expect_record_store().returning(move |t| {
            stored_clone.lock().unwrap().push(t.clone());
            Ok(())
        });
        let metrics = Metrics::new();

        let mut t = task();
        t.retry_count = MAX_RETRIES; // already at 5, about to become 6

        handle_transient(&mock, &metrics, &mut t, 200).await.unwrap();

        assert_eq!(t.retry_count, MAX_RETRIES + 1);
        assert_eq!(t.status, Status::Failed);
        assert_eq!(t.error, "exhausted retries");
    }
}
