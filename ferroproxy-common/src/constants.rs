//! Default ports and addresses for FerroProxy services.

/// Destination port assumed when a `Host` header carries none.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Port conventionally used by CONNECT tunnels to HTTPS origins.
pub const DEFAULT_CONNECT_PORT: u16 = 443;

/// Default proxy listen address (`127.0.0.1:8080`).
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default bind address for the metrics endpoint.
pub const DEFAULT_METRICS_BIND: &str = "127.0.0.1:9090";
