//! Prometheus metrics for reconciliation passes

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

use crate::Result;

pub const RESULT_SUCCESS: &str = "success";
pub const RESULT_ERROR: &str = "error";

/// Counters and latencies of the caller-facing operations
#[derive(Clone)]
pub struct ReconcileMetrics {
    /// Operations by name and result
    pub operations_total: CounterVec,
    /// Operation duration in seconds
    pub operation_duration_seconds: HistogramVec,
    pub registry: Arc<Registry>,
}

impl ReconcileMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = CounterVec::new(
            Opts::new(
                "load_balancer_operations_total",
                "Total load balancer reconciliation operations",
            ),
            &["operation", "result"],
        )?;

        let operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "load_balancer_operation_duration_seconds",
                "Load balancer reconciliation latency in seconds",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(operations_total.clone()))?;
        registry.register(Box::new(operation_duration_seconds.clone()))?;

        Ok(Self {
            operations_total,
            operation_duration_seconds,
            registry,
        })
    }

    pub fn observe(&self, operation: &str, success: bool, elapsed: Duration) {
        let result = if success { RESULT_SUCCESS } else { RESULT_ERROR };
        self.operations_total
            .with_label_values(&[operation, result])
            .inc();
        self.operation_duration_seconds
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }

    /// Count recorded for `operation` with `result`
    pub fn count(&self, operation: &str, result: &str) -> u64 {
        self.operations_total
            .with_label_values(&[operation, result])
            .get() as u64
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
