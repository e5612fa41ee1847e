//! Metric recording points; no-ops unless built with the `metrics` feature
//! and metrics were initialized at runtime.

#![cfg_attr(not(feature = "metrics"), allow(unused_variables))]

#[cfg(feature = "metrics")]
use ferroproxy_observability::metrics::{
    metrics_enabled, ACTIVE_CONNECTIONS, BYTES_PUMPED_TOTAL, CONNECTIONS_ACCEPTED_TOTAL,
    CONNECTIONS_REJECTED_TOTAL, PLUGIN_FAULTS_TOTAL, REQUESTS_TOTAL, TUNNELS_TOTAL,
    UPSTREAM_FAILURES_TOTAL,
};

pub(crate) fn connection_opened() {
    #[cfg(feature = "metrics")]
    {
        if metrics_enabled() {
            CONNECTIONS_ACCEPTED_TOTAL.inc();
            ACTIVE_CONNECTIONS.inc();
        }
    }
}

pub(crate) fn connection_closed() {
    #[cfg(feature = "metrics")]
    {
        if metrics_enabled() {
            ACTIVE_CONNECTIONS.dec();
        }
    }
}

pub(crate) fn connection_rejected() {
    #[cfg(feature = "metrics")]
    {
        if metrics_enabled() {
            CONNECTIONS_REJECTED_TOTAL.inc();
        }
    }
}

/// `outcome` is one of `forwarded`, `tunneled`, `denied`, `bad_request`
pub(crate) fn request(outcome: &str) {
    #[cfg(feature = "metrics")]
    {
        if metrics_enabled() {
            REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
        }
    }
}

pub(crate) fn upstream_failure() {
    #[cfg(feature = "metrics")]
    {
        if metrics_enabled() {
            UPSTREAM_FAILURES_TOTAL.inc();
        }
    }
}

pub(crate) fn plugin_fault(plugin: &str, hook: &str) {
    #[cfg(feature = "metrics")]
    {
        if metrics_enabled() {
            PLUGIN_FAULTS_TOTAL.with_label_values(&[plugin, hook]).inc();
        }
    }
}

/// `kind` is `connect` or `websocket`
pub(crate) fn tunnel_opened(kind: &str) {
    #[cfg(feature = "metrics")]
    {
        if metrics_enabled() {
            TUNNELS_TOTAL.with_label_values(&[kind]).inc();
        }
    }
}

pub(crate) fn bytes_pumped(to_upstream: u64, to_client: u64) {
    #[cfg(feature = "metrics")]
    {
        if metrics_enabled() {
            BYTES_PUMPED_TOTAL
                .with_label_values(&["upstream"])
                .inc_by(to_upstream);
            BYTES_PUMPED_TOTAL
                .with_label_values(&["client"])
                .inc_by(to_client);
        }
    }
}
