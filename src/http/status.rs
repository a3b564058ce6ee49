//! `GET /task/:id`, `GET /queue/status`, and `GET /health` (spec §4.3, plus
//! the supplemented health check, see SPEC_FULL.md).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use store::TaskRecord;
use tracing::error;

use crate::http::submission::ErrorBody;
use crate::platform::context::PlatformContext;

pub async fn get_task(
    State(ctx): State<PlatformContext>,
    Path(id): Path<String>,
) -> Result<Json<TaskRecord>, (StatusCode, Json<ErrorBody>)> {
    let task = ctx.store().record_get(&id).await.map_err(|err| {
        error!(%err, task_id = %id, "store error on status lookup");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: "store error".to_string(),
            }),
        )
    })?;

    task.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "task not found".to_string(),
            }),
        )
    })
}

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub fifo_queue_length: u64,
    pub priority_queue_length: u64,
    pub total_backlog: u64,
}

pub async fn queue_status(
    State(ctx): State<PlatformContext>,
) -> Result<Json<QueueStatusResponse>, (StatusCode, Json<ErrorBody>)> {
    let store = ctx.store();

    let (fifo_queue_length, priority_queue_length) =
        tokio::try_join!(store.fifo_length(), store.priority_length()).map_err(|err| {
            error!(%err, "store error on queue status");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "store error".to_string(),
                }),
            )
        })?;

    Ok(Json(QueueStatusResponse {
        fifo_queue_length,
        priority_queue_length,
        total_backlog: fifo_queue_length + priority_queue_length,
    }))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use store::MockStore;

    fn context_with(mock: MockStore) -> PlatformContext {
        use crate::metrics::Metrics;
        use crate::platform::config::PlatformConfig;
        use crate::rate_limiting::RateLimiter;
        use tokio_util::sync::CancellationToken;

        let store: Arc<dyn store::Store> = Arc::new(mock);
        let rate_limiter = Arc::new(RateLimiter::new(store.clone(), 10_000));
        PlatformContext::new(
            PlatformConfig::default(),
            store,
            rate_limiter,
            Arc::new(Metrics::new()),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn missing_task_returns_404() {
        let mut mock = MockStore::new();
        mock.expect_record_get().returning(|_| Ok(None));
        let ctx = context_with(mock);

        let result = get_task(State(ctx), Path("ghost".to_string())).await;
        let (status, _) = result.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn queue_status_sums_both_lengths() {
        let mut mock = MockStore::new();
        mock.expect_fifo_length().returning(|| Ok(3));
        mock.expect_priority_length().returning(|| Ok(4));
        let ctx = context_with(mock);

        let Json(body) = queue_status(State(ctx)).await.unwrap();
        assert_eq!(body.fifo_queue_length, 3);
        assert_eq!(body.priority_queue_length, 4);
        assert_eq!(body.total_backlog, 7);
    }
}
