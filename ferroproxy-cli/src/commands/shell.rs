//! Shell subcommand implementation
//!
//! Edits the rule file offline: the same plugins as `serve` are initialized,
//! so `write memory` persists to the configured rule file.

use crate::console::Console;
use anyhow::Result;
use clap::Args;
use ferroproxy::Server;
use ferroproxy_observability::init_minimal_logging;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ShellArgs {
    /// TOML configuration file
    #[arg(long, env = "FERROPROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Firewall rule file to load and save
    #[arg(long, env = "FERROPROXY_RULES")]
    rules: Option<PathBuf>,
}

pub async fn run(args: ShellArgs) -> Result<()> {
    init_minimal_logging();

    let config = super::load_config(args.config.as_deref(), None, args.rules)?;
    let server = Server::builder().config(config).build().await?;

    let mut console = Console::new(server.registry());
    tokio::task::spawn_blocking(move || console.run(std::io::stdin().lock(), std::io::stdout()))
        .await??;

    server.registry().shutdown_all().await;
    Ok(())
}
