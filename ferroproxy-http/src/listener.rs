//! Accept loop with connection limits and graceful drain

use crate::connection::{serve_connection, ConnectionContext};
use crate::metrics;
use ferroproxy_common::Result;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Decrements the active-connection gauge however the task ends
struct ActiveConnection;

impl ActiveConnection {
    fn open() -> Self {
        metrics::connection_opened();
        Self
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        metrics::connection_closed();
    }
}

/// Bound proxy socket
pub struct ProxyListener {
    listener: TcpListener,
    ctx: Arc<ConnectionContext>,
    connection_semaphore: Arc<Semaphore>,
    shutdown_grace: Duration,
}

impl ProxyListener {
    pub async fn bind(addr: SocketAddr, ctx: Arc<ConnectionContext>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let connection_semaphore = Arc::new(Semaphore::new(ctx.limits.max_connections));
        let shutdown_grace = ctx.timeouts.shutdown_grace();
        Ok(Self {
            listener,
            ctx,
            connection_semaphore,
            shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves, then stop accepting and
    /// give in-flight connections the grace period before aborting them.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("Proxy listening on {}", self.local_addr()?);

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };

                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
                    }

                    // Acquire connection permit (limit concurrent connections)
                    let Ok(permit) = self.connection_semaphore.clone().try_acquire_owned() else {
                        warn!("Max connections reached, rejecting connection from {}", peer_addr);
                        metrics::connection_rejected();
                        drop(stream);
                        continue;
                    };

                    let ctx = self.ctx.clone();
                    let span = info_span!("conn", conn_id = %Uuid::new_v4(), peer_addr = %peer_addr);
                    connections.spawn(
                        async move {
                            let _permit = permit;
                            let _active = ActiveConnection::open();
                            if let Err(e) = serve_connection(stream, peer_addr, ctx).await {
                                debug!(error = %e, "Connection ended with error");
                            }
                        }
                        .instrument(span),
                    );
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(self.listener);
        info!(in_flight = connections.len(), "Stopped accepting, draining connections");

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !drained {
            warn!(
                remaining = connections.len(),
                "Shutdown grace period elapsed, aborting connections"
            );
            connections.shutdown().await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferroproxy_common::ProxyConfig;
    use ferroproxy_plugin::PluginRegistry;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn start(config: ProxyConfig) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<Result<()>>) {
        let ctx = Arc::new(ConnectionContext::new(Arc::new(PluginRegistry::new()), &config));
        let listener = ProxyListener::bind("127.0.0.1:0".parse().unwrap(), ctx)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(listener.run_until(async {
            let _ = rx.await;
        }));
        (addr, tx, handle)
    }

    #[tokio::test]
    async fn test_serves_then_stops() {
        let (addr, tx, handle) = start(ProxyConfig::default()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert!(out.starts_with(b"HTTP/1.1 400 Bad Request"));

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_stalled_connection_aborted_after_grace() {
        let mut config = ProxyConfig::default();
        config.timeouts.shutdown_grace_secs = 1;
        let (addr, tx, handle) = start(config).await;

        // Connected but never sends a request
        let mut stream = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let mut buf = Vec::new();
        let n = stream.read_to_end(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let mut config = ProxyConfig::default();
        config.limits.max_connections = 1;
        let (addr, tx, handle) = start(config).await;

        let held = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut rejected = TcpStream::connect(addr).await.unwrap();
        let mut buf = Vec::new();
        let n = rejected.read_to_end(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);

        tx.send(()).unwrap();
        drop(held);
        handle.await.unwrap().unwrap();
    }
}
