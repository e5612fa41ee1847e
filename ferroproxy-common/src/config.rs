//! Configuration types for `FerroProxy`
//!
//! Everything here is startup-time configuration. A TOML file can supply any
//! subset of the fields; missing ones fall back to their defaults.

use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to do when a response hook fails part-way through the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFaultPolicy {
    /// Stop transforming and serve the last successfully produced bytes
    #[default]
    ServeLastGood,
    /// Discard the response and answer `502 Bad Gateway`
    FailClosed,
}

/// Resource limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum concurrent client connections (default: 10000)
    pub max_connections: usize,
    /// Maximum size of a request or response header block (default: 64KB)
    pub max_head_bytes: usize,
    /// Largest request body accepted via `Content-Length` (default: 16MB)
    pub max_body_bytes: usize,
    /// Chunk size used by each pump direction (default: 16KB)
    pub pump_buffer_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            max_head_bytes: 64 * 1024,
            max_body_bytes: 16 * 1024 * 1024,
            pump_buffer_bytes: 16 * 1024,
        }
    }
}

/// Timeouts, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream TCP connect timeout (default: 10s)
    pub connect_secs: u64,
    /// Time allowed for the client to send a complete request head (default: 30s)
    pub head_read_secs: u64,
    /// Idle timeout for tunnels and response intake (default: none)
    pub idle_secs: Option<u64>,
    /// How long in-flight connections may drain after the listener stops (default: 30s)
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            head_read_secs: 30,
            idle_secs: None,
            shutdown_grace_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn head_read(&self) -> Duration {
        Duration::from_secs(self.head_read_secs)
    }

    pub fn idle(&self) -> Option<Duration> {
        self.idle_secs.map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Top-level proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Address the proxy listens on
    pub listen: SocketAddr,
    /// Firewall rule file loaded at startup and written by `save-config`
    pub rules_file: Option<PathBuf>,
    pub limits: LimitsConfig,
    pub timeouts: TimeoutConfig,
    pub response_faults: ResponseFaultPolicy,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: ([127, 0, 0, 1], 8080).into(),
            rules_file: None,
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
            response_faults: ResponseFaultPolicy::default(),
        }
    }
}

impl ProxyConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: ProxyConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_connections == 0 {
            return Err(ProxyError::Config("max_connections must be > 0".into()));
        }
        if self.limits.max_head_bytes == 0 {
            return Err(ProxyError::Config("max_head_bytes must be > 0".into()));
        }
        if self.limits.pump_buffer_bytes == 0 {
            return Err(ProxyError::Config("pump_buffer_bytes must be > 0".into()));
        }
        if self.timeouts.connect_secs == 0 || self.timeouts.head_read_secs == 0 {
            return Err(ProxyError::Config("timeouts must be > 0".into()));
        }
        if self.timeouts.idle_secs == Some(0) {
            return Err(ProxyError::Config("idle_secs must be > 0 when set".into()));
        }
        if self.timeouts.shutdown_grace_secs == 0 {
            return Err(ProxyError::Config(
                "shutdown_grace_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}
