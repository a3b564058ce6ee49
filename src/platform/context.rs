use std::sync::Arc;

use store::Store;
use tokio_util::sync::CancellationToken;

use crate::metrics::Metrics;
use crate::platform::config::PlatformConfig;
use crate::rate_limiting::RateLimiter;

#[derive(Clone)]
pub struct PlatformContext {
    shared: Arc<SharedState>,
    shutdown: CancellationToken,
}

struct SharedState {
    config: PlatformConfig,
    store: Arc<dyn Store>,
    rate_limiter: Arc<RateLimiter>,
    metrics: Arc<Metrics>,
}

impl PlatformContext {
    pub fn new(
        config: PlatformConfig,
        store: Arc<dyn Store>,
        rate_limiter: Arc<RateLimiter>,
        metrics: Arc<Metrics>,
        shutdown: CancellationToken,
    ) -> Self {
        let shared = SharedState {
            config,
            store,
            rate_limiter,
            metrics,
        };

        Self {
            shared: Arc::new(shared),
            shutdown,
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.shared.config
    }

    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.shared.store)
    }

    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.shared.rate_limiter)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.shared.metrics)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
