//! Serve subcommand implementation

use crate::console::Console;
use anyhow::Result;
use clap::Args;
use ferroproxy::Server;
use ferroproxy_common::DEFAULT_METRICS_BIND;
use ferroproxy_observability::{
    init_metrics, init_minimal_logging, init_tracing, shutdown_tracing, start_metrics_server,
    LogFormat, TracingConfig,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides the config file)
    #[arg(long, env = "FERROPROXY_LISTEN")]
    listen: Option<SocketAddr>,

    /// TOML configuration file
    #[arg(long, env = "FERROPROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Firewall rule file, loaded on startup and written by `write memory`
    #[arg(long, env = "FERROPROXY_RULES")]
    rules: Option<PathBuf>,

    /// Log format (text or json)
    #[arg(long, default_value = "text", env = "FERROPROXY_LOG_FORMAT")]
    log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint
    #[arg(long, env = "FERROPROXY_METRICS")]
    metrics: bool,

    /// Metrics bind address
    #[arg(long, default_value = DEFAULT_METRICS_BIND, env = "FERROPROXY_METRICS_BIND")]
    metrics_bind: SocketAddr,

    /// OTLP endpoint for span export
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Run the administration console on stdin while serving
    #[arg(long)]
    console: bool,
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let tracing_config = TracingConfig {
        service_name: "ferroproxy".to_string(),
        format: args.log_format,
        otlp_endpoint: args.otlp_endpoint.clone(),
    };
    if let Err(e) = init_tracing(tracing_config) {
        init_minimal_logging();
        warn!("Falling back to minimal logging: {}", e);
    }

    let config = super::load_config(args.config.as_deref(), args.listen, args.rules)?;

    info!("Starting FerroProxy v{}", env!("CARGO_PKG_VERSION"));
    let server = Server::builder().config(config).build().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if args.metrics {
        init_metrics();
        let metrics_addr = args.metrics_bind;
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let stopped = async move {
                let _ = rx.wait_for(|stop| *stop).await;
            };
            if let Err(e) = start_metrics_server(metrics_addr, stopped).await {
                error!("Metrics server on {} failed: {}", metrics_addr, e);
            }
        });
    }

    if args.console {
        let console = Console::new(server.registry());
        let tx = shutdown_tx.clone();
        tokio::task::spawn_blocking(move || {
            let mut console = console;
            if let Err(e) = console.run(std::io::stdin().lock(), std::io::stdout()) {
                error!("Console failed: {}", e);
            }
            // Leaving the console stops the proxy
            let _ = tx.send(true);
        });
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut rx = shutdown_rx;
    let result = server
        .run_until(async move {
            let _ = rx.wait_for(|stop| *stop).await;
        })
        .await;

    shutdown_tracing();
    result?;

    if args.console {
        // The console thread may still be blocked reading stdin
        std::process::exit(0);
    }
    Ok(())
}
