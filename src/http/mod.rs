//! The HTTP submission/query surface (spec §4.2, §4.3, §6). The core queue
//! layer and worker subsystems never depend on this module; it only depends
//! on them through [`PlatformContext`](crate::platform::context::PlatformContext).

pub mod status;
pub mod submission;

use axum::routing::{get, post};
use axum::Router;

use crate::platform::context::PlatformContext;

pub fn router(ctx: PlatformContext) -> Router {
    Router::new()
        .route("/task/fifo", post(submission::submit_fifo))
        .route("/task/pq", post(submission::submit_priority))
        .route("/task/:id", get(status::get_task))
        .route("/queue/status", get(status::queue_status))
        .route("/health", get(status::health))
        .with_state(ctx)
}
