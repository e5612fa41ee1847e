//! Error types for `FerroProxy`

use thiserror::Error;

/// Main error type for `FerroProxy` operations
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request head could not be parsed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Upstream connect or resolution failure
    #[error("Upstream unreachable: {0}")]
    Upstream(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Two plugins registered under the same name
    #[error("Duplicate plugin name: {0}")]
    DuplicatePlugin(String),

    /// A command name is already claimed by another plugin
    #[error("Duplicate command {command} registered by {plugin}")]
    DuplicateCommand { command: String, plugin: String },

    /// A plugin was registered before (or without) a plugin it requires
    #[error("Plugin {plugin} requires plugin {requires} to be registered first")]
    MissingDependency { plugin: String, requires: String },

    /// A plugin lifecycle hook failed
    #[error("Plugin {plugin} failed: {message}")]
    Plugin { plugin: String, message: String },

    /// Rule persistence failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ProxyError {
    /// Configuration faults are fatal at startup; everything else is per-connection.
    pub fn is_config_fault(&self) -> bool {
        matches!(
            self,
            ProxyError::Config(_)
                | ProxyError::DuplicatePlugin(_)
                | ProxyError::DuplicateCommand { .. }
                | ProxyError::MissingDependency { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ProxyError>;

impl From<toml::de::Error> for ProxyError {
    fn from(err: toml::de::Error) -> Self {
        ProxyError::Config(err.to_string())
    }
}
