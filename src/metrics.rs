//! Prometheus counters/gauges for the platform's `/metrics` endpoint
//! (ground: `platform/telemetry.rs`'s metrics handler, generalized from a
//! static string to a real `prometheus::Registry`).

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

pub struct Metrics {
    registry: Registry,
    pub tasks_submitted: IntCounter,
    pub tasks_duplicate: IntCounter,
    pub tasks_finalized: IntCounterVec,
    pub retries_scheduled: IntCounter,
    pub retries_promoted: IntCounter,
    pub rate_limit_rejections: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let tasks_submitted =
            IntCounter::new("taskqueue_tasks_submitted_total", "Tasks accepted by the submission endpoint").unwrap();
        let tasks_duplicate = IntCounter::new(
            "taskqueue_tasks_duplicate_total",
            "Submissions that matched an existing task ID",
        )
        .unwrap();
        let tasks_finalized = IntCounterVec::new(
            Opts::new("taskqueue_tasks_finalized_total", "Tasks that reached a terminal status"),
            &["status"],
        )
        .unwrap();
        let retries_scheduled = IntCounter::new(
            "taskqueue_retries_scheduled_total",
            "Transient failures that were scheduled for a future retry",
        )
        .unwrap();
        let retries_promoted = IntCounter::new(
            "taskqueue_retries_promoted_total",
            "Due retry entries promoted back onto a live queue",
        )
        .unwrap();
        let rate_limit_rejections = IntCounter::new(
            "taskqueue_rate_limit_rejections_total",
            "Requests rejected by the fixed-window rate limiter",
        )
        .unwrap();

        registry.register(Box::new(tasks_submitted.clone())).unwrap();
        registry.register(Box::new(tasks_duplicate.clone())).unwrap();
        registry.register(Box::new(tasks_finalized.clone())).unwrap();
        registry.register(Box::new(retries_scheduled.clone())).unwrap();
        registry.register(Box::new(retries_promoted.clone())).unwrap();
        registry
            .register(Box::new(rate_limit_rejections.clone()))
            .unwrap();

        Self {
            registry,
            tasks_submitted,
            tasks_duplicate,
            tasks_finalized,
            retries_scheduled,
            retries_promoted,
            rate_limit_rejections,
        }
    }

    pub fn render_prometheus(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf).ok();
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_registered_counters() {
        let metrics = Metrics::new();
        metrics.tasks_submitted.inc();
        metrics.tasks_finalized.with_label_values(&["success"]).inc();

        let rendered = metrics.render_prometheus();
        assert!(rendered.contains("taskqueue_tasks_submitted_total 1"));
        assert!(rendered.contains("taskqueue_tasks_finalized_total"));
    }
}
