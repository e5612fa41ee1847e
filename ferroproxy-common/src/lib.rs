//! Common utilities and types for `FerroProxy`

pub mod config;
pub mod constants;
pub mod error;

pub use config::{LimitsConfig, ProxyConfig, ResponseFaultPolicy, TimeoutConfig};
pub use constants::{
    DEFAULT_CONNECT_PORT, DEFAULT_HTTP_PORT, DEFAULT_LISTEN_ADDR, DEFAULT_METRICS_BIND,
};
pub use error::{ProxyError, Result};
