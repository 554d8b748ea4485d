//! # Prometheus Metrics
//!
//! Counts what a simulation run did to the vault and records the final pool
//! totals. The text exposition is appended to the report when the
//! `--metrics` flag is set.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Holds all Prometheus metric handles for a simulation run.
///
/// Clone-friendly (prometheus handles are reference counted) so it can be
/// shared with the blocking tasks of a concurrent batch.
#[derive(Clone)]
pub struct SimMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Steps executed, by operation and outcome (`ok` / `failed`).
    pub operations_total: IntCounterVec,
    /// Total assets after the last step.
    pub total_assets: IntGauge,
    /// Total share supply after the last step.
    pub total_supply: IntGauge,
    /// Wall-clock time per step, in seconds.
    pub step_latency_seconds: Histogram,
}

impl SimMetrics {
    /// Creates and registers all metrics. Call once per run.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("sharevault".into()), None)
            .expect("failed to create prometheus registry");

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Scenario steps executed"),
            &["operation", "outcome"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(operations_total.clone()))
            .expect("metric registration");

        let total_assets = IntGauge::new("total_assets", "Assets under management")
            .expect("metric creation");
        registry
            .register(Box::new(total_assets.clone()))
            .expect("metric registration");

        let total_supply = IntGauge::new("total_supply", "Shares outstanding")
            .expect("metric creation");
        registry
            .register(Box::new(total_supply.clone()))
            .expect("metric registration");

        let step_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("step_latency_seconds", "Time to execute one scenario step")
                .buckets(vec![
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
                ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(step_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            operations_total,
            total_assets,
            total_supply,
            step_latency_seconds,
        }
    }

    /// Records one executed step.
    pub fn record_step(&self, operation: &str, ok: bool, seconds: f64) {
        let outcome = if ok { "ok" } else { "failed" };
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.step_latency_seconds.observe(seconds);
    }

    /// Sets the pool gauges. Values above `i64::MAX` are clamped.
    pub fn set_pool(&self, total_assets: u64, total_supply: u64) {
        self.total_assets
            .set(i64::try_from(total_assets).unwrap_or(i64::MAX));
        self.total_supply
            .set(i64::try_from(total_supply).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for SimMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_recorded_steps() {
        let metrics = SimMetrics::new();
        metrics.record_step("deposit", true, 0.0001);
        metrics.record_step("deposit", false, 0.0002);
        metrics.set_pool(1_800, 1_500);

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"sharevault_operations_total{operation="deposit",outcome="ok"} 1"#));
        assert!(text.contains(r#"sharevault_operations_total{operation="deposit",outcome="failed"} 1"#));
        assert!(text.contains("sharevault_total_assets 1800"));
        assert!(text.contains("sharevault_total_supply 1500"));
    }
}
