use crate::metrics::gather_metrics;
use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Serve `/metrics` and `/health/ready` until `shutdown` resolves
pub async fn start_metrics_server(
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = Router::new()
        .route("/health/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn ready_handler() -> &'static str {
    "OK"
}

async fn metrics_handler() -> String {
    gather_metrics()
}
