use async_trait::async_trait;
use bytes::Bytes;
use ferroproxy_protocol::HttpRequest;
use std::collections::HashMap;
use std::sync::Arc;

/// Boxed error returned by plugin hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Handler for one administration command; receives the argument tokens
pub type CommandHandler = Arc<dyn Fn(&[String]) -> Option<String> + Send + Sync>;

/// Command name → handler, as declared by a plugin
pub type CommandTable = HashMap<String, CommandHandler>;

/// Outcome of a request hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginAction {
    /// Allow the request, continue with the next plugin
    Continue,

    /// Stop the chain and refuse the request
    Deny { reason: String },
}

impl PluginAction {
    pub fn deny(reason: impl Into<String>) -> Self {
        PluginAction::Deny {
            reason: reason.into(),
        }
    }
}

/// Core plugin trait
///
/// Plugins are constructed once at startup, registered with a
/// [`PluginRegistry`](crate::PluginRegistry), initialized exactly once before
/// traffic flows and shut down exactly once, in reverse registration order.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique plugin name
    fn name(&self) -> &str;

    /// Plugin version
    fn version(&self) -> &str {
        "0.1.0"
    }

    /// Human-readable purpose
    fn description(&self) -> &str {
        ""
    }

    /// Plugins that must be registered before this one
    fn requires(&self) -> &[&'static str] {
        &[]
    }

    /// Initialize plugin (called once on startup)
    async fn init(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Shutdown plugin (called once on graceful shutdown)
    async fn shutdown(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Hook: admission decision for a parsed request.
    ///
    /// An `Err` is treated as a denial by the registry.
    async fn on_request(&self, _req: &HttpRequest) -> Result<PluginAction, BoxError> {
        Ok(PluginAction::Continue)
    }

    /// Hook: transform the raw upstream response (header block and body).
    ///
    /// Receives the previous plugin's output. On `Err` the chain stops and the
    /// last successfully produced bytes are kept.
    async fn on_response(&self, response: Bytes, _req: &HttpRequest) -> Result<Bytes, BoxError> {
        Ok(response)
    }

    /// Administration commands, read once at registration
    fn commands(&self) -> CommandTable {
        CommandTable::new()
    }
}

/// Wrap a closure as a [`CommandHandler`].
pub fn command<F>(handler: F) -> CommandHandler
where
    F: Fn(&[String]) -> Option<String> + Send + Sync + 'static,
{
    Arc::new(handler)
}
