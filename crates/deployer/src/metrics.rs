//! Deploy flow metrics and the Prometheus exporter.
use metrics::{Counter, Histogram};
use metrics_derive::Metrics;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Metrics for the `ballot_deployer` component.
#[derive(Metrics, Clone)]
#[metrics(scope = "ballot_deployer")]
pub struct DeployerMetrics {
    #[metric(describe = "Number of deploy flows started")]
    pub flows_started: Counter,

    #[metric(describe = "Number of user operations accepted by the relay")]
    pub operations_submitted: Counter,

    #[metric(describe = "Number of user operations confirmed on chain")]
    pub operations_confirmed: Counter,

    #[metric(describe = "Number of deploy flows ending in Failed")]
    pub flows_failed: Counter,

    #[metric(describe = "Number of flows that stopped polling without a terminal status")]
    pub indeterminate_outcomes: Counter,

    #[metric(describe = "Number of check-status calls that errored")]
    pub poll_errors: Counter,

    #[metric(describe = "Seconds from relay acceptance to confirmation")]
    pub confirmation_latency: Histogram,
}

/// Serve Prometheus metrics over HTTP on `addr`.
pub fn init_prometheus_exporter(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
}
