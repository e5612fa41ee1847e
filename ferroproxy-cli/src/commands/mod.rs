pub mod serve;
pub mod shell;
pub mod version;

use anyhow::{Context, Result};
use ferroproxy_common::ProxyConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Load the configuration file if given, then apply flag overrides.
pub fn load_config(
    path: Option<&Path>,
    listen: Option<SocketAddr>,
    rules: Option<PathBuf>,
) -> Result<ProxyConfig> {
    let mut config = match path {
        Some(path) => ProxyConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ProxyConfig::default(),
    };

    if let Some(listen) = listen {
        config.listen = listen;
    }
    if rules.is_some() {
        config.rules_file = rules;
    }
    Ok(config)
}
