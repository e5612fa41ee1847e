//! Prometheus metrics for the proxy
//!
//! Metrics are registered lazily in [`REGISTRY`] and only recorded once
//! [`init_metrics`] has been called, so embedding the proxy without metrics
//! costs one atomic load per call site.

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;

static METRICS_ENABLED: AtomicBool = AtomicBool::new(false);

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn register<C: prometheus::core::Collector + Clone + 'static>(collector: C) -> C {
    REGISTRY.register(Box::new(collector.clone())).unwrap();
    collector
}

pub static CONNECTIONS_ACCEPTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register(
        IntCounter::new(
            "ferroproxy_connections_accepted_total",
            "Client connections accepted",
        )
        .unwrap(),
    )
});

pub static CONNECTIONS_REJECTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register(
        IntCounter::new(
            "ferroproxy_connections_rejected_total",
            "Client connections refused at the connection limit",
        )
        .unwrap(),
    )
});

pub static ACTIVE_CONNECTIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    register(IntGauge::new("ferroproxy_active_connections", "Connections in flight").unwrap())
});

pub static REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register(
        IntCounterVec::new(
            Opts::new("ferroproxy_requests_total", "Parsed requests by outcome"),
            &["outcome"],
        )
        .unwrap(),
    )
});

pub static UPSTREAM_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register(
        IntCounter::new(
            "ferroproxy_upstream_failures_total",
            "Upstream connects that failed or timed out",
        )
        .unwrap(),
    )
});

pub static PLUGIN_FAULTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register(
        IntCounterVec::new(
            Opts::new("ferroproxy_plugin_faults_total", "Plugin hook errors"),
            &["plugin", "hook"],
        )
        .unwrap(),
    )
});

pub static TUNNELS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register(
        IntCounterVec::new(
            Opts::new("ferroproxy_tunnels_total", "Raw byte tunnels opened"),
            &["kind"],
        )
        .unwrap(),
    )
});

pub static BYTES_PUMPED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register(
        IntCounterVec::new(
            Opts::new("ferroproxy_bytes_pumped_total", "Bytes copied through tunnels"),
            &["direction"],
        )
        .unwrap(),
    )
});

/// Enable recording and register every metric.
pub fn init_metrics() {
    LazyLock::force(&CONNECTIONS_ACCEPTED_TOTAL);
    LazyLock::force(&CONNECTIONS_REJECTED_TOTAL);
    LazyLock::force(&ACTIVE_CONNECTIONS);
    LazyLock::force(&REQUESTS_TOTAL);
    LazyLock::force(&UPSTREAM_FAILURES_TOTAL);
    LazyLock::force(&PLUGIN_FAULTS_TOTAL);
    LazyLock::force(&TUNNELS_TOTAL);
    LazyLock::force(&BYTES_PUMPED_TOTAL);
    METRICS_ENABLED.store(true, Ordering::Release);
}

pub fn metrics_enabled() -> bool {
    METRICS_ENABLED.load(Ordering::Acquire)
}

/// Current metrics in the Prometheus text exposition format
pub fn gather_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_after_init() {
        init_metrics();
        assert!(metrics_enabled());

        CONNECTIONS_ACCEPTED_TOTAL.inc();
        BYTES_PUMPED_TOTAL.with_label_values(&["upstream"]).inc_by(42);

        let text = gather_metrics();
        assert!(text.contains("ferroproxy_connections_accepted_total"));
        assert!(text.contains("ferroproxy_bytes_pumped_total{direction=\"upstream\"}"));
    }
}
