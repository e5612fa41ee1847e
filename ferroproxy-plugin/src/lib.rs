//! # FerroProxy Plugin System
//!
//! Every request admitted by the proxy and every response it relays passes
//! through an ordered chain of plugins held by a [`PluginRegistry`].
//!
//! ## Features
//!
//! - **Ordered pipeline** - Hooks run in strict registration order
//! - **Fail-safe admission** - A failing request hook counts as a denial
//! - **Graceful responses** - A failing response hook keeps the last good bytes
//! - **Commands** - Plugins contribute administration commands to one flat table
//! - **Built-in Plugins** - Firewall, rule store, firewall shell and access log
//!
//! ## Creating a Custom Plugin
//!
//! ```rust
//! use ferroproxy_plugin::{BoxError, Plugin, PluginAction};
//! use ferroproxy_protocol::HttpRequest;
//! use async_trait::async_trait;
//!
//! struct NoAdmin;
//!
//! #[async_trait]
//! impl Plugin for NoAdmin {
//!     fn name(&self) -> &str {
//!         "no-admin"
//!     }
//!
//!     async fn on_request(&self, req: &HttpRequest) -> Result<PluginAction, BoxError> {
//!         if req.path().starts_with("/admin") {
//!             return Ok(PluginAction::deny("admin area"));
//!         }
//!         Ok(PluginAction::Continue)
//!     }
//! }
//! ```
//!
//! ## Registering Plugins
//!
//! ```rust,no_run
//! use ferroproxy_plugin::builtin::{AccessLogPlugin, Firewall, FirewallPlugin, Rule};
//! use ferroproxy_plugin::PluginRegistry;
//!
//! #[tokio::main]
//! async fn main() -> ferroproxy_common::Result<()> {
//!     let firewall = Firewall::new();
//!     firewall.add_rule(Rule::deny().with("domain", "example.org"), None);
//!
//!     let mut registry = PluginRegistry::new();
//!     registry.register(FirewallPlugin::new(firewall.clone()))?;
//!     registry.register(AccessLogPlugin::new())?;
//!     registry.init_all().await?;
//!
//!     println!("{}", registry.dispatch("show-firewall-rules").unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## See Also
//!
//! - [`Plugin`] - Core plugin trait
//! - [`PluginRegistry`] - Plugin management and execution
//! - [`builtin::Firewall`] - Rule engine handle shared by the firewall plugins

pub mod builtin;
pub mod registry;
pub mod traits;

pub use registry::*;
pub use traits::*;
