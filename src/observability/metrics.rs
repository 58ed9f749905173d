//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): requests by backend, algorithm, status
//! - `lb_response_duration_seconds` (histogram): latency by backend, algorithm
//! - `lb_active_connections` (gauge): in-flight requests per backend
//! - `lb_backend_health` (gauge): 1=alive, 0=dead
//!
//! # Design Decisions
//! - Uses the `metrics` facade; without an installed recorder every call is a no-op
//! - Prometheus exporter listens on its own address, never on the proxy listener

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::observability::events::{EventSink, HealthEvent, RequestEvent};

const NO_BACKEND: &str = "none";

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("lb_response_duration_seconds".to_string()),
            &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .install()?;

    describe_counter!("lb_requests_total", "Total number of requests processed by the load balancer");
    describe_histogram!(
        "lb_response_duration_seconds",
        metrics::Unit::Seconds,
        "Response time distribution"
    );
    describe_gauge!("lb_active_connections", "Number of active connections per backend");
    describe_gauge!("lb_backend_health", "Health status of backends (1=healthy, 0=unhealthy)");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Event sink that records into the global metrics recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink;

impl EventSink for MetricsSink {
    fn record_request(&self, event: &RequestEvent) {
        let backend = event.backend.clone().unwrap_or_else(|| NO_BACKEND.to_string());
        counter!(
            "lb_requests_total",
            "backend" => backend.clone(),
            "algorithm" => event.algorithm.as_str(),
            "status" => event.status.to_string()
        )
        .increment(1);
        histogram!(
            "lb_response_duration_seconds",
            "backend" => backend,
            "algorithm" => event.algorithm.as_str()
        )
        .record(event.latency_ms as f64 / 1000.0);
    }

    fn record_health(&self, event: &HealthEvent) {
        gauge!("lb_backend_health", "backend" => event.backend.clone())
            .set(if event.alive { 1.0 } else { 0.0 });
    }

    fn record_connections(&self, backend: &str, active: i64) {
        gauge!("lb_active_connections", "backend" => backend.to_string()).set(active as f64);
    }
}
