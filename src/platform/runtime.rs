use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use store::RedisStore;

use crate::metrics::Metrics;
use crate::platform::config::PlatformConfig;
use crate::platform::context::PlatformContext;
use crate::platform::service::ServiceRegistration;
use crate::platform::telemetry::telemetry_service;
use crate::rate_limiting::RateLimiter;

/// Builds up the set of background services a binary wants running, then
/// hands out a [`PlatformRuntime`] that owns their lifetime.
///
/// Every binary (`api`, `worker`) constructs one `Platform`, registers the
/// services it needs on top of the telemetry service that's always present,
/// and calls `start()`. This keeps the worker loop and retry scheduler from
/// importing each other's internals; they only ever see a
/// [`PlatformContext`] (spec §9's "cyclic dependency avoidance").
pub struct Platform {
    config: PlatformConfig,
    services: Vec<ServiceRegistration>,
}

impl Platform {
    pub fn new(config: PlatformConfig) -> Self {
        let mut services = Vec::new();
        services.push(telemetry_service(config.observability.clone()));

        Self { config, services }
    }

    pub fn register_service(&mut self, service: ServiceRegistration) {
        self.services.push(service);
    }

    pub async fn start(self) -> Result<PlatformRuntime> {
        initialize_logging(&self.config);

        let store: Arc<dyn store::Store> =
            Arc::new(RedisStore::connect(&self.config.store.redis_url).await?);
        let metrics = Arc::new(Metrics::new());
        let rate_limiter = Arc::new(RateLimiter::new(
            store.clone(),
            self.config.rate_limiting.requests_per_minute,
        ));

        let root_token = CancellationToken::new();
        let context = PlatformContext::new(
            self.config.clone(),
            store,
            rate_limiter,
            metrics,
            root_token.child_token(),
        );

        let mut tasks = Vec::new();
        for service in self.services {
            let handle = service.spawn(context.clone(), root_token.child_token());
            tasks.push((service.name().to_string(), handle));
        }

        info!("platform boot completed");

        Ok(PlatformRuntime {
            context,
            cancel_token: root_token,
            tasks,
        })
    }
}

pub struct PlatformRuntime {
    context: PlatformContext,
    cancel_token: CancellationToken,
    tasks: Vec<(String, JoinHandle<Result<()>>)>,
}

impl PlatformRuntime {
    pub fn context(&self) -> PlatformContext {
        self.context.clone()
    }

    pub async fn shutdown(self) -> Result<()> {
        self.cancel_token.cancel();

        for (name, handle) in self.tasks {
            match handle.await {
                Ok(Ok(())) => info!(service = %name, "service shutdown cleanly"),
                Ok(Err(err)) => {
                    return Err(err);
                }
                Err(err) => {
                    return Err(err.into());
                }
            }
        }

        Ok(())
    }
}

fn initialize_logging(config: &PlatformConfig) {
    let filter = &config.observability.log_level;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter.as_str())
        .try_init();
}
