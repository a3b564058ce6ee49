//! Per-client fixed-window rate limiter (spec §4.7). A pure advisor: it
//! never blocks the core queue/worker/retry subsystems, only the HTTP edge.

use std::sync::Arc;

use chrono::Utc;
use store::Store;

/// Window TTL: long enough that a key from the previous minute has expired
/// by the time a client revisits it, short enough to self-clean quickly.
const WINDOW_TTL_SECONDS: i64 = 2 * 60;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("rate limit exceeded")]
pub struct RateLimitExceeded;

pub struct RateLimiter {
    store: Arc<dyn Store>,
    requests_per_minute: u32,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>, requests_per_minute: u32) -> Self {
        Self {
            store,
            requests_per_minute,
        }
    }

    /// Increments the fixed-window counter for `client_id` and reports
    /// whether the request is admitted. Key format and window semantics
    /// follow spec §6/§4.7 exactly: `rl:<client>:<YYYYMMDDHHMM>`, a 2-minute
    /// TTL set only when the increment lands on 1.
    pub async fn check(&self, client_id: &str) -> store::StoreResult<RateLimitResult> {
        let now = Utc::now();
        let window = now.format("%Y%m%d%H%M").to_string();
        let key = format!("rl:{client_id}:{window}");

        let count = self.store.rate_limit_incr(&key, WINDOW_TTL_SECONDS).await?;

        let remaining = (self.requests_per_minute as i64 - count).max(0) as u32;
        let allowed = count <= self.requests_per_minute as i64;

        let seconds_into_minute = now.timestamp() % 60;
        let retry_after = (60 - seconds_into_minute).clamp(0, 60) as u32;

        Ok(RateLimitResult {
            allowed,
            remaining,
            retry_after,
            limit: self.requests_per_minute,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MockStore;

    #[tokio::test]
    async fn admits_requests_under_the_limit() {
        let mut mock = MockStore::new();
        mock.expect_rate_limit_incr().returning(|_, _| Ok(3));
        let limiter = RateLimiter::new(Arc::new(mock), 10_000);

        let result = limiter.check("client-a").await.unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining, 9_997);
        assert!(result.retry_after <= 60);
    }

    #[tokio::test]
    async fn rejects_once_the_window_count_exceeds_the_limit() {
        let mut mock = MockStore::new();
        mock.expect_rate_limit_incr().returning(|_, _| Ok(10_001));
        let limiter = RateLimiter::new(Arc::new(mock), 10_000);

        let result = limiter.check("client-a").await.unwrap();
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
    }
}
