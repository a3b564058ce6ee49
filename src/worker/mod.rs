//! The worker loop (spec §4.4): polls its assigned queue, fetches the task
//! record, and runs it through `process`.

pub mod process;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

pub use process::WorkerMode;

use crate::platform::context::PlatformContext;
use crate::platform::service::ServiceRegistration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSelector {
    Fifo,
    Priority,
}

impl QueueSelector {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fifo" => Some(QueueSelector::Fifo),
            "priority" => Some(QueueSelector::Priority),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            QueueSelector::Fifo => "fifo",
            QueueSelector::Priority => "priority",
        }
    }
}

/// Builds the worker main loop as a [`ServiceRegistration`] so it shares
/// lifecycle management (spawn + cancellation) with every other background
/// activity in the process.
pub fn worker_loop_service(selector: QueueSelector, mode: WorkerMode) -> ServiceRegistration {
    let name = format!("worker-{}", selector.label());

    ServiceRegistration::new(
        name,
        Arc::new(move |ctx: PlatformContext, token: CancellationToken| {
            tokio::spawn(async move { run_worker_loop(ctx, token, selector, mode).await })
        }),
    )
}

async fn run_worker_loop(
    ctx: PlatformContext,
    token: CancellationToken,
    selector: QueueSelector,
    mode: WorkerMode,
) -> anyhow::Result<()> {
    let store = ctx.store();
    let metrics = ctx.metrics();
    let worker_config = ctx.config().worker.clone();
    let base_backoff_ms = ctx.config().retry.base_backoff_ms;

    loop {
        if token.is_cancelled() {
            break;
        }

        let popped = match selector {
            QueueSelector::Fifo => store.fifo_dequeue().await,
            QueueSelector::Priority => store.priority_dequeue().await,
        };

        let id = match popped {
            Ok(Some(id)) => id,
            Ok(None) => {
                sleep_or_cancel(
                    Duration::from_millis(worker_config.empty_poll_interval_ms),
                    &token,
                )
                .await;
                continue;
            }
            Err(err) => {
                error!(%err, "store error dequeuing task");
                sleep_or_cancel(Duration::from_millis(worker_config.error_backoff_ms), &token).await;
                continue;
            }
        };

        let task = match store.record_get(&id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                // Record expired or never existed: absorbs double-delivered
                // IDs for already-finalized tasks (spec §4.4 step 4).
                warn!(task_id = %id, "record missing on dequeue, skipping");
                continue;
            }
            Err(err) => {
                error!(task_id = %id, %err, "store error fetching record");
                sleep_or_cancel(Duration::from_millis(worker_config.error_backoff_ms), &token).await;
                continue;
            }
        };

        if task.status.is_terminal() {
            // Re-check after pop: a double-enqueued already-finalized task
            // must not be re-executed (spec §5 idempotency boundary, §9).
            warn!(task_id = %id, status = ?task.status, "already terminal, skipping");
            continue;
        }

        if let Err(err) = process::process(&*store, &metrics, task, mode, base_backoff_ms).await {
            error!(task_id = %id, %err, "error processing task");
        }
    }

    Ok(())
}

async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = token.cancelled() => {}
    }
}
