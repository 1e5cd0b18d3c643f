//! # Prometheus Metrics
//!
//! Exposes escrow activity for the devnet node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use lendpact_contracts::ErrorKind;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are reference counted) so it can be
/// shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    pub loans_requested_total: IntCounter,
    pub loans_approved_total: IntCounter,
    pub loans_taken_total: IntCounter,
    pub loans_refused_total: IntCounter,
    pub loans_canceled_total: IntCounter,
    /// Rejected escrow operations, labelled by error kind.
    pub operations_rejected_total: IntCounterVec,
    /// Value currently held in escrow custody. Saturates at `i64::MAX`.
    pub escrow_custody: IntGauge,
    /// Current devnet block height.
    pub block_height: IntGauge,
    /// Time spent holding the escrow lock per operation, in seconds.
    pub operation_latency_seconds: Histogram,
}

fn register<C: Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C, prometheus::Error> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("lendpact".into()), None)?;

        let loans_requested_total = register(
            &registry,
            IntCounter::new("loans_requested_total", "Loan requests accepted")?,
        )?;
        let loans_approved_total = register(
            &registry,
            IntCounter::new("loans_approved_total", "Loans funded into escrow")?,
        )?;
        let loans_taken_total = register(
            &registry,
            IntCounter::new("loans_taken_total", "Loans paid out to their receiver")?,
        )?;
        let loans_refused_total = register(
            &registry,
            IntCounter::new("loans_refused_total", "Loans refunded to their funder")?,
        )?;
        let loans_canceled_total = register(
            &registry,
            IntCounter::new("loans_canceled_total", "Requests canceled before funding")?,
        )?;
        let operations_rejected_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new(
                    "operations_rejected_total",
                    "Escrow operations rejected, by error kind",
                ),
                &["kind"],
            )?,
        )?;
        let escrow_custody = register(
            &registry,
            IntGauge::new("escrow_custody", "Value currently held in escrow custody")?,
        )?;
        let block_height = register(
            &registry,
            IntGauge::new("block_height", "Current devnet block height")?,
        )?;
        let operation_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "operation_latency_seconds",
                    "Time spent executing one escrow operation",
                )
                .buckets(vec![
                    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
                ]),
            )?,
        )?;

        Ok(Self {
            registry,
            loans_requested_total,
            loans_approved_total,
            loans_taken_total,
            loans_refused_total,
            loans_canceled_total,
            operations_rejected_total,
            escrow_custody,
            block_height,
            operation_latency_seconds,
        })
    }

    pub fn record_rejection(&self, kind: ErrorKind) {
        let label = kind.to_string();
        self.operations_rejected_total
            .with_label_values(&[label.as_str()])
            .inc();
    }

    /// Refresh the gauges that mirror escrow state.
    pub fn observe_escrow(&self, custody: u128, block_height: u64) {
        self.escrow_custody
            .set(i64::try_from(custody).unwrap_or(i64::MAX));
        self.block_height
            .set(i64::try_from(block_height).unwrap_or(i64::MAX));
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

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_namespace() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.loans_requested_total.inc();
        metrics.record_rejection(ErrorKind::InvalidState);
        metrics.observe_escrow(1_500, 42);

        let text = metrics.encode().unwrap();
        assert!(text.contains("lendpact_loans_requested_total 1"));
        assert!(text.contains("lendpact_operations_rejected_total{kind=\"InvalidState\"} 1"));
        assert!(text.contains("lendpact_escrow_custody 1500"));
        assert!(text.contains("lendpact_block_height 42"));
    }

    #[test]
    fn custody_gauge_saturates() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.observe_escrow(u128::MAX, 0);
        assert_eq!(metrics.escrow_custody.get(), i64::MAX);
    }
}
