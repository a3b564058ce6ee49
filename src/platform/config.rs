use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "configs/taskqueue.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub observability: ObservabilitySettings,
    pub store: StoreSettings,
    pub http: HttpSettings,
    pub rate_limiting: RateLimitingSettings,
    pub worker: WorkerSettings,
    pub retry: RetrySettings,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilitySettings::default(),
            store: StoreSettings::default(),
            http: HttpSettings::default(),
            rate_limiting: RateLimitingSettings::default(),
            worker: WorkerSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl PlatformConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(None::<PathBuf>)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            File::from(PathBuf::from(DEFAULT_CONFIG_PATH))
                .format(FileFormat::Toml)
                .required(false),
        );

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path.as_ref())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(Environment::with_prefix("TASKQUEUE").separator("__"));

        let config = builder.build()?;
        config
            .try_deserialize()
            .context("invalid task-queue platform configuration")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    pub log_level: String,
    pub metrics_port: u16,
    pub enable_metrics: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_port: 9090,
            enable_metrics: true,
        }
    }
}

/// Connection settings for the shared key-value store (spec §6's
/// `REDIS_ADDR` environment variable, wrapped into a full `redis://` URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub redis_url: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let addr = std::env::var("REDIS_ADDR").unwrap_or_else(|_| "localhost:6379".to_string());
        Self {
            redis_url: format!("redis://{addr}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub bind_addr: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitingSettings {
    pub requests_per_minute: u32,
    pub enabled: bool,
}

impl Default for RateLimitingSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 10_000,
            enabled: true,
        }
    }
}

/// `--queue` / `--mode` defaults for the worker binary (spec §6's "Process
/// configuration"). The CLI flags in `src/bin/worker.rs` take precedence
/// over these when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub queue: String,
    pub mode: String,
    pub empty_poll_interval_ms: u64,
    pub error_backoff_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue: "fifo".to_string(),
            mode: "simple".to_string(),
            empty_poll_interval_ms: 100,
            error_backoff_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub tick_ms: u64,
    pub batch_size: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            tick_ms: 200,
            batch_size: 128,
            base_backoff_ms: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = PlatformConfig::default();
        assert_eq!(config.retry.base_backoff_ms, 200);
        assert_eq!(config.retry.batch_size, 128);
        assert_eq!(config.retry.tick_ms, 200);
        assert_eq!(config.rate_limiting.requests_per_minute, 10_000);
    }
}
