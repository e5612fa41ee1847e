//! FerroProxy CLI
//!
//! Forward HTTP/HTTPS proxy with a plugin pipeline and a first-match firewall.

// Use mimalloc as the global allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod console;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ferroproxy",
    author,
    version,
    about = "Forward HTTP/HTTPS proxy with a plugin-driven firewall",
    long_about = "FerroProxy is a forward HTTP/HTTPS proxy in Rust.\n\n\
                  Every request passes through an ordered plugin chain; the built-in \
                  firewall allows or denies it by first-match rules.",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server
    Serve(commands::serve::ServeArgs),

    /// Configure firewall rules interactively
    Shell(commands::shell::ShellArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args).await,
        Commands::Shell(args) => commands::shell::run(args).await,
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
