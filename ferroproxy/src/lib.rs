//! # `FerroProxy`
//!
//! A forward HTTP/HTTPS proxy whose admission and response handling is
//! driven by an ordered chain of plugins.
//!
//! ## Overview
//!
//! Clients send ordinary proxy requests (`GET http://host/path`) or open
//! `CONNECT` tunnels. Every request first passes through the plugin chain;
//! the built-in firewall evaluates an ordered rule list and the first match
//! decides. Admitted requests are forwarded upstream, tunnels and WebSocket
//! upgrades are pumped byte-for-byte.
//!
//! ## Features
//!
//! - 🛡️ **Firewall** - First-match allow/deny rules on IP, CIDR, domain, port, method and path
//! - 🔌 **Plugins** - Request and response hooks plus administration commands
//! - 🔀 **Tunnels** - `CONNECT` and WebSocket pass-through
//! - 💾 **Persistence** - Rules stored as TOML and restored on startup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferroproxy::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> ferroproxy::Result<()> {
//!     let server = Server::builder()
//!         .config(ProxyConfig::default())
//!         .rules_file("rules.toml")
//!         .build()
//!         .await?;
//!
//!     server.firewall().add_rule(Rule::deny().with("domain", "ads.example"), None);
//!
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`ferroproxy-common`] - Errors, configuration and defaults
//! - [`ferroproxy-protocol`] - HTTP/1.1 head parsing and canned responses
//! - [`ferroproxy-plugin`] - Plugin trait, registry and built-in plugins
//! - [`ferroproxy-http`] - Connection engine, byte pump and listener

pub mod server;

// Re-export subcrates
pub use ferroproxy_common as common;
pub use ferroproxy_http as http;
pub use ferroproxy_plugin as plugin;
pub use ferroproxy_protocol as protocol;

pub use server::{Server, ServerBuilder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::common::{ProxyConfig, ProxyError, ResponseFaultPolicy, Result};
    pub use crate::plugin::builtin::{Action, Firewall, Rule};
    pub use crate::plugin::{BoxError, Plugin, PluginAction, PluginRegistry};
    pub use crate::protocol::HttpRequest;
    pub use crate::server::{Server, ServerBuilder};
}

// Convenience re-exports at crate root
pub use common::{ProxyConfig, ProxyError, Result};
