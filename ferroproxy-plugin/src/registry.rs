use crate::traits::*;
use bytes::Bytes;
use ferroproxy_common::{ProxyError, Result};
use ferroproxy_protocol::HttpRequest;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Result of running the request hook chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Every plugin continued
    Allowed,
    /// A plugin denied the request
    Denied { plugin: String, reason: String },
    /// A plugin hook failed; treated as a denial
    Faulted { plugin: String, error: String },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Result of running the response hook chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Every plugin transformed the response
    Complete(Bytes),
    /// A plugin failed; `bytes` is the last successfully produced value
    Degraded {
        bytes: Bytes,
        plugin: String,
        error: String,
    },
}

impl ResponseOutcome {
    /// Best-known response bytes, regardless of faults
    pub fn into_bytes(self) -> Bytes {
        match self {
            ResponseOutcome::Complete(bytes) | ResponseOutcome::Degraded { bytes, .. } => bytes,
        }
    }
}

struct RegisteredPlugin {
    name: String,
    requires: Vec<String>,
    plugin: Arc<RwLock<dyn Plugin>>,
}

/// Registry manages all loaded plugins and the flat command table
///
/// Built during startup through `&mut self`; once shared behind an `Arc` the
/// plugin list and command table are read-only.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<RegisteredPlugin>,
    commands: HashMap<String, CommandHandler>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            commands: HashMap::new(),
        }
    }

    /// Register a plugin and merge its command table.
    ///
    /// Fails without touching the registry if the plugin name or any of its
    /// command names is already taken.
    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) -> Result<()> {
        let name = plugin.name().to_string();
        if self.plugins.iter().any(|p| p.name == name) {
            return Err(ProxyError::DuplicatePlugin(name));
        }

        let commands = plugin.commands();
        if let Some(command) = commands.keys().find(|c| self.commands.contains_key(*c)) {
            return Err(ProxyError::DuplicateCommand {
                command: command.clone(),
                plugin: name,
            });
        }

        debug!(
            plugin = %name,
            version = plugin.version(),
            commands = commands.len(),
            "Registered plugin"
        );

        self.commands.extend(commands);
        self.plugins.push(RegisteredPlugin {
            requires: plugin.requires().iter().map(ToString::to_string).collect(),
            name,
            plugin: Arc::new(RwLock::new(plugin)),
        });
        Ok(())
    }

    /// Initialize all plugins in registration order.
    ///
    /// A plugin whose required collaborators were not registered before it,
    /// or whose `init` fails, aborts startup.
    pub async fn init_all(&self) -> Result<()> {
        for (index, entry) in self.plugins.iter().enumerate() {
            for required in &entry.requires {
                if !self.plugins[..index].iter().any(|p| p.name == *required) {
                    return Err(ProxyError::MissingDependency {
                        plugin: entry.name.clone(),
                        requires: required.clone(),
                    });
                }
            }

            let mut plugin = entry.plugin.write().await;
            info!("Initializing plugin: {}", entry.name);
            plugin.init().await.map_err(|e| ProxyError::Plugin {
                plugin: entry.name.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Execute request hooks on all plugins, stopping at the first denial
    pub async fn execute_request_hooks(&self, req: &HttpRequest) -> Admission {
        for entry in &self.plugins {
            let plugin = entry.plugin.read().await;
            match plugin.on_request(req).await {
                Ok(PluginAction::Continue) => continue,
                Ok(PluginAction::Deny { reason }) => {
                    debug!(plugin = %entry.name, reason = %reason, "Request denied");
                    return Admission::Denied {
                        plugin: entry.name.clone(),
                        reason,
                    };
                }
                Err(e) => {
                    error!(plugin = %entry.name, error = %e, "Plugin raised error on request");
                    return Admission::Faulted {
                        plugin: entry.name.clone(),
                        error: e.to_string(),
                    };
                }
            }
        }
        Admission::Allowed
    }

    /// Execute response hooks as a pipeline: each plugin receives the
    /// previous plugin's output
    pub async fn execute_response_hooks(&self, response: Bytes, req: &HttpRequest) -> ResponseOutcome {
        let mut data = response;
        for entry in &self.plugins {
            let plugin = entry.plugin.read().await;
            match plugin.on_response(data.clone(), req).await {
                Ok(next) => data = next,
                Err(e) => {
                    error!(plugin = %entry.name, error = %e, "Plugin raised error on response");
                    return ResponseOutcome::Degraded {
                        bytes: data,
                        plugin: entry.name.clone(),
                        error: e.to_string(),
                    };
                }
            }
        }
        ResponseOutcome::Complete(data)
    }

    /// Shutdown all plugins in reverse registration order.
    ///
    /// Failures are logged and do not stop the remaining plugins.
    pub async fn shutdown_all(&self) {
        for entry in self.plugins.iter().rev() {
            let mut plugin = entry.plugin.write().await;
            info!("Shutting down plugin: {}", entry.name);
            if let Err(e) = plugin.shutdown().await {
                warn!(plugin = %entry.name, error = %e, "Plugin shutdown failed");
            }
        }
    }

    /// Route an administration command line to its handler.
    ///
    /// Blank lines yield `None`; unknown commands yield a diagnostic.
    pub fn dispatch(&self, line: &str) -> Option<String> {
        let mut tokens = line.split_whitespace();
        let command = tokens.next()?;
        let args: Vec<String> = tokens.map(ToString::to_string).collect();

        match self.commands.get(command) {
            Some(handler) => handler(&args),
            None => Some(format!("Unknown command: {command}")),
        }
    }

    /// Registered command names, sorted
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// Plugin names in registration order
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
