//! The retry scheduler (spec §4.6): on a fixed tick, promotes due entries
//! from the retry set back onto their priority queue.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::platform::context::PlatformContext;
use crate::platform::service::ServiceRegistration;
use crate::worker::process::unix_seconds_now;

pub fn retry_scheduler_service() -> ServiceRegistration {
    ServiceRegistration::new(
        "retry-scheduler",
        Arc::new(move |ctx: PlatformContext, token: CancellationToken| {
            tokio::spawn(async move { run_retry_scheduler(ctx, token).await })
        }),
    )
}

async fn run_retry_scheduler(ctx: PlatformContext, token: CancellationToken) -> anyhow::Result<()> {
    let store = ctx.store();
    let metrics = ctx.metrics();
    let retry_config = ctx.config().retry.clone();
    let mut ticker = tokio::time::interval(Duration::from_millis(retry_config.tick_ms));

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let due = match store
            .retry_pop_due(retry_config.batch_size, unix_seconds_now())
            .await
        {
            Ok(due) => due,
            Err(err) => {
                error!(%err, "retry scheduler failed to pop due entries");
                continue;
            }
        };

        for id in due {
            match store.reenqueue_by_type(&id).await {
                Ok(()) => {
                    metrics.retries_promoted.inc();
                    info!(task_id = %id, "promoted retry back onto its queue");
                }
                Err(err) => {
                    error!(task_id = %id, %err, "failed to re-enqueue due retry");
                }
            }
        }
    }

    Ok(())
}
