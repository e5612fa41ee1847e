//! Embeddable proxy server with builder pattern.
//!
//! # Example
//!
//! ```rust,no_run
//! use ferroproxy::Server;
//!
//! # async fn example() -> ferroproxy::Result<()> {
//! let server = Server::builder()
//!     .listen("127.0.0.1:3128".parse().unwrap())
//!     .rules_file("/etc/ferroproxy/rules.toml")
//!     .build()
//!     .await?;
//!
//! server.run_until(std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```

use ferroproxy_common::{ProxyConfig, Result};
use ferroproxy_http::{ConnectionContext, ProxyListener};
use ferroproxy_plugin::builtin::{
    AccessLogPlugin, Firewall, FirewallPlugin, FirewallShellPlugin, RuleFile, RuleStorePlugin,
};
use ferroproxy_plugin::{Plugin, PluginRegistry};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

type Registration = Box<dyn FnOnce(&mut PluginRegistry) -> Result<()> + Send>;

/// A proxy server that can be embedded in your application.
///
/// Use [`Server::builder()`] to create a new server with the builder pattern.
pub struct Server {
    config: ProxyConfig,
    firewall: Firewall,
    registry: Arc<PluginRegistry>,
}

/// Builder for constructing a [`Server`].
///
/// Built-in plugins are always registered first, in a fixed order:
/// `firewall`, `rule-store` (only with a rules file), `firewall-shell` and
/// `access-log`. Plugins passed to [`plugin()`](Self::plugin) follow in the
/// order they were added.
#[derive(Default)]
pub struct ServerBuilder {
    config: ProxyConfig,
    rules_file: Option<PathBuf>,
    plugins: Vec<Registration>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Serve until `shutdown` resolves.
    ///
    /// Once the shutdown future completes the listener stops accepting,
    /// in-flight connections get the configured grace period and are then
    /// aborted. Plugins are finalized in reverse registration order, also
    /// when binding fails.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let result = self.serve(shutdown).await;
        self.registry.shutdown_all().await;
        info!("Proxy stopped");
        result
    }

    async fn serve<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let ctx = Arc::new(ConnectionContext::new(self.registry.clone(), &self.config));
        let listener = ProxyListener::bind(self.config.listen, ctx).await?;
        listener.run_until(shutdown).await
    }

    /// Shared handle to the live rule list.
    pub fn firewall(&self) -> &Firewall {
        &self.firewall
    }

    pub fn registry(&self) -> Arc<PluginRegistry> {
        self.registry.clone()
    }

    /// Run one administration command line against the registry.
    pub fn dispatch(&self, line: &str) -> Option<String> {
        self.registry.dispatch(line)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("plugins", &self.registry.plugin_names())
            .finish_non_exhaustive()
    }
}

impl ServerBuilder {
    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the address the proxy listens on.
    ///
    /// Default: `127.0.0.1:8080`
    #[must_use]
    pub fn listen(mut self, addr: SocketAddr) -> Self {
        self.config.listen = addr;
        self
    }

    /// Persist firewall rules in this file and load them on startup.
    ///
    /// Takes precedence over `rules_file` in the configuration.
    #[must_use]
    pub fn rules_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_file = Some(path.into());
        self
    }

    /// Append a plugin after the built-ins.
    #[must_use]
    pub fn plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins
            .push(Box::new(move |registry: &mut PluginRegistry| registry.register(plugin)));
        self
    }

    /// Validate the configuration, register and initialize every plugin.
    ///
    /// # Errors
    ///
    /// Returns an error on an invalid configuration, a duplicate plugin or
    /// command name, a missing plugin dependency or a failing `init`. Nothing
    /// is bound in that case.
    pub async fn build(self) -> Result<Server> {
        let ServerBuilder {
            mut config,
            rules_file,
            plugins,
        } = self;

        config.validate()?;
        if rules_file.is_some() {
            config.rules_file = rules_file;
        }

        let firewall = Firewall::new();
        let store = config.rules_file.as_ref().map(RuleFile::new);

        let mut registry = PluginRegistry::new();
        registry.register(FirewallPlugin::new(firewall.clone()))?;
        if let Some(store) = &store {
            registry.register(RuleStorePlugin::new(firewall.clone(), store.clone()))?;
        }
        registry.register(FirewallShellPlugin::new(firewall.clone(), store))?;
        registry.register(AccessLogPlugin::new())?;

        for register in plugins {
            register(&mut registry)?;
        }

        registry.init_all().await?;
        info!(plugins = ?registry.plugin_names(), "Plugins initialized");

        Ok(Server {
            config,
            firewall,
            registry: Arc::new(registry),
        })
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("config", &self.config)
            .field("rules_file", &self.rules_file)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}
