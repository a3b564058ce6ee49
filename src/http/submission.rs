//! `POST /task/fifo` and `POST /task/pq` (spec §4.2).

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use store::{JobType, QueueKind, Status, TaskRecord};
use tracing::error;
use uuid::Uuid;

use crate::platform::context::PlatformContext;

const CLIENT_ID_HEADER: &str = "x-client-id";
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Pulls the rate-limiting identity out of `X-Client-Id`, falling back to a
/// shared `anonymous` bucket for callers that don't set it (spec §4.7 treats
/// the client identifier as opaque; it doesn't mandate a header name).
fn client_id(headers: &HeaderMap) -> String {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub id: Option<String>,
    pub job_type: String,
    pub payload: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: String,
    pub task: TaskRecord,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

pub async fn submit_fifo(
    State(ctx): State<PlatformContext>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ErrorBody>)> {
    submit(ctx, headers, req, QueueKind::Fifo).await
}

pub async fn submit_priority(
    State(ctx): State<PlatformContext>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ErrorBody>)> {
    submit(ctx, headers, req, QueueKind::Priority).await
}

/// Implements spec §4.2's processing order. The exists-then-store steps are
/// collapsed into one `record_store_if_absent` call: this tightens (but does
/// not remove) the TOCTOU window between two racing submissions of the same
/// ID, per the open-question decision in SPEC_FULL.md §9.
async fn submit(
    ctx: PlatformContext,
    headers: HeaderMap,
    req: SubmitRequest,
    queue: QueueKind,
) -> Result<(StatusCode, Json<SubmitResponse>), (StatusCode, Json<ErrorBody>)> {
    let client_id = client_id(&headers);
    let limit = ctx.rate_limiter().check(&client_id).await.map_err(|err| {
        error!(%err, "store error checking rate limit");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "store error")
    })?;

    if !limit.allowed {
        ctx.metrics().rate_limit_rejections.inc();
        return Err(error_response(
            StatusCode::TOO_MANY_REQUESTS,
            format!("rate limit exceeded, retry after {}s", limit.retry_after),
        ));
    }

    let job_type = JobType::parse(&req.job_type)
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "job_type must be 'short' or 'long'"))?;

    let id = req.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let store = ctx.store();
    let task = TaskRecord::new(id.clone(), job_type, req.payload);

    let created = store.record_store_if_absent(&task).await.map_err(|err| {
        error!(%err, "store error on submission");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "store error")
    })?;

    if !created {
        let existing = store
            .record_get(&id)
            .await
            .map_err(|err| {
                error!(%err, "store error fetching existing record");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "store error")
            })?
            .ok_or_else(|| {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "record vanished after duplicate check")
            })?;

        ctx.metrics().tasks_duplicate.inc();

        return Ok((
            StatusCode::OK,
            Json(SubmitResponse {
                message: "Task already exists".to_string(),
                task: existing,
            }),
        ));
    }

    let enqueue_result = match queue {
        QueueKind::Fifo => store.fifo_enqueue(&id).await,
        QueueKind::Priority => store.priority_enqueue(&id, job_type).await,
    };

    enqueue_result.map_err(|err| {
        error!(%err, "store error enqueueing task");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "store error")
    })?;

    ctx.metrics().tasks_submitted.inc();

    debug_assert_eq!(task.status, Status::Queued);

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: "Task submitted".to_string(),
            task,
        }),
    ))
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
    async fn rejects_unknown_job_type() {
        let mut mock = MockStore::new();
        mock.expect_rate_limit_incr().returning(|_, _| Ok(1));
        let ctx = context_with(mock);

        let result = submit(
            ctx,
            HeaderMap::new(),
            SubmitRequest {
                id: None,
                job_type: "medium".to_string(),
                payload: "p".to_string(),
            },
            QueueKind::Fifo,
        )
        .await;

        let (status, _) = result.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn new_submission_stores_then_enqueues() {
        let mut mock = MockStore::new();
        mock.expect_rate_limit_incr().returning(|_, _| Ok(1));
        mock.expect_record_store_if_absent().returning(|_| Ok(true));
        mock.expect_fifo_enqueue().returning(|_| Ok(()));
        let ctx = context_with(mock);

        let (status, Json(body)) = submit(
            ctx,
            HeaderMap::new(),
            SubmitRequest {
                id: Some("abc".to_string()),
                job_type: "short".to_string(),
                payload: "p".to_string(),
            },
            QueueKind::Fifo,
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.task.id, "abc");
        assert_eq!(body.task.status, Status::Queued);
    }

    #[tokio::test]
    async fn duplicate_submission_returns_existing_record_without_enqueueing() {
        let mut mock = MockStore::new();
        mock.expect_rate_limit_incr().returning(|_, _| Ok(1));
        mock.expect_record_store_if_absent().returning(|_| Ok(false));
        mock.expect_record_get().returning(|id| {
            Ok(Some(TaskRecord::new(id.to_string(), JobType::Short, "original".into())))
        });
        // No `expect_fifo_enqueue` call: if submit() called it, the mock
        // would panic on an unexpected call.
        let ctx = context_with(mock);

        let (status, Json(body)) = submit(
            ctx,
            HeaderMap::new(),
            SubmitRequest {
                id: Some("abc".to_string()),
                job_type: "short".to_string(),
                payload: "new".to_string(),
            },
            QueueKind::Fifo,
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.message, "Task already exists");
        assert_eq!(body.task.payload, "original");
    }

    #[tokio::test]
    async fn rate_limited_client_is_rejected_before_touching_the_store() {
        let mut mock = MockStore::new();
        mock.expect_rate_limit_incr().returning(|_, _| Ok(10_001));
        // No `expect_record_store_if_absent`/`expect_fifo_enqueue`: a
        // rejected request must never reach the duplicate check.
        let ctx = context_with(mock);

        let result = submit(
            ctx,
            HeaderMap::new(),
            SubmitRequest {
                id: Some("abc".to_string()),
                job_type: "short".to_string(),
                payload: "p".to_string(),
            },
            QueueKind::Fifo,
        )
        .await;

        let (status, _) = result.unwrap_err();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }
}
