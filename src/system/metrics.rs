//! Metrics collection and monitoring for the plan store
//!
//! Every plan operation is counted by outcome and timed. Metrics live in a
//! registry owned by [`Metrics`] rather than the process-global default, so
//! independent instances (one per test router, for example) never collide.

use std::time::Instant;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::core::error::{Error, Result};
use crate::engine::OrphanReport;

/// Plan operation names used as the `operation` label
pub mod operation {
    /// POST /plans
    pub const CREATE: &str = "create";
    /// GET /plans/{id}
    pub const READ: &str = "read";
    /// PUT /plans/{id}
    pub const REPLACE: &str = "replace";
    /// PATCH /plans/{id}
    pub const PATCH: &str = "patch";
    /// DELETE /plans/{id}
    pub const DELETE: &str = "delete";
    /// GET /plans
    pub const LIST: &str = "list";
    /// Orphan collection pass
    pub const COLLECT_ORPHANS: &str = "collect_orphans";
}

/// Centralized metrics for plan operations
pub struct Metrics {
    registry: Registry,
    /// Operations by name and outcome (`ok` or an error kind)
    pub plan_operations: IntCounterVec,
    /// Engine latency per operation, in seconds
    pub operation_duration: HistogramVec,
    /// Conditional reads answered with 304
    pub not_modified: IntCounter,
    /// Child entities removed by orphan collection, by kind
    pub orphans_removed: IntCounterVec,
}

impl Metrics {
    /// Create and register all metrics
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("planstore".to_string()), None)?;

        let plan_operations = IntCounterVec::new(
            Opts::new("plan_operations_total", "Plan operations by outcome"),
            &["operation", "outcome"],
        )?;
        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "operation_duration_seconds",
                "Duration of plan operations in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        let not_modified = IntCounter::new(
            "not_modified_total",
            "Conditional reads answered without a body",
        )?;
        let orphans_removed = IntCounterVec::new(
            Opts::new("orphans_removed_total", "Orphaned child entities removed"),
            &["kind"],
        )?;

        registry.register(Box::new(plan_operations.clone()))?;
        registry.register(Box::new(operation_duration.clone()))?;
        registry.register(Box::new(not_modified.clone()))?;
        registry.register(Box::new(orphans_removed.clone()))?;

        Ok(Self {
            registry,
            plan_operations,
            operation_duration,
            not_modified,
            orphans_removed,
        })
    }

    /// Start timing an operation
    pub fn start(&self, operation: &'static str) -> Timer<'_> {
        Timer {
            metrics: self,
            operation,
            start: Instant::now(),
        }
    }

    /// Count orphan collection results
    pub fn record_orphans(&self, report: &OrphanReport) {
        self.orphans_removed
            .with_label_values(&["membercostshare"])
            .inc_by(report.cost_shares as u64);
        self.orphans_removed
            .with_label_values(&["planservice"])
            .inc_by(report.linked_services as u64);
        self.orphans_removed
            .with_label_values(&["service"])
            .inc_by(report.services as u64);
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        exposition_text(buffer)
    }
}

fn exposition_text(buffer: Vec<u8>) -> Result<String> {
    String::from_utf8(buffer)
        .map_err(|e| Error::Metrics(prometheus::Error::Msg(format!("Metrics not UTF-8: {}", e))))
}

/// Measures one operation and records its outcome when finished
pub struct Timer<'a> {
    metrics: &'a Metrics,
    operation: &'static str,
    start: Instant,
}

impl Timer<'_> {
    /// Record duration and outcome, passing the result through
    pub fn finish<T>(self, result: Result<T>) -> Result<T> {
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        self.metrics
            .operation_duration
            .with_label_values(&[self.operation])
            .observe(self.start.elapsed().as_secs_f64());
        self.metrics
            .plan_operations
            .with_label_values(&[self.operation, outcome])
            .inc();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_counts_outcomes() {
        let metrics = Metrics::new().unwrap();

        metrics.start(operation::CREATE).finish(Ok(())).unwrap();
        let _ = metrics
            .start(operation::CREATE)
            .finish::<()>(Err(Error::conflict("p")));

        let ok = metrics.plan_operations.with_label_values(&["create", "ok"]).get();
        let conflict = metrics.plan_operations.with_label_values(&["create", "conflict"]).get();
        assert_eq!((ok, conflict), (1, 1));
    }

    #[test]
    fn test_render_uses_namespace() {
        let metrics = Metrics::new().unwrap();
        metrics.start(operation::READ).finish(Ok(())).unwrap();
        metrics.record_orphans(&OrphanReport {
            cost_shares: 2,
            linked_services: 0,
            services: 1,
        });

        let text = metrics.render().unwrap();
        assert!(text.contains("planstore_plan_operations_total"));
        assert!(text.contains("planstore_orphans_removed_total{kind=\"service\"} 1"));
    }

    #[test]
    fn test_invalid_exposition_is_a_metrics_error() {
        let err = exposition_text(vec![0xff, 0xfe]).unwrap_err();
        assert_eq!(err.kind(), "metrics");
        assert!(err.is_server_error());
    }

    #[test]
    fn test_instances_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.not_modified.inc();
        assert_eq!(b.not_modified.get(), 0);
    }
}
