//! Bidirectional byte pump for CONNECT tunnels and upgraded connections
//!
//! Both directions run concurrently; the first end-of-stream or error on
//! either side ends the pump, cancels the other direction and shuts down both
//! write halves. No half-open tunnel outlives its first closing peer.
//!
//! The idle timeout covers the tunnel as a whole: traffic in either direction
//! keeps both directions alive.

use crate::metrics;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

/// Bytes copied by one pump run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub to_upstream: u64,
    pub to_client: u64,
}

/// Last time either direction read something
struct Activity {
    start: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let elapsed = u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    fn deadline(&self, idle: Duration) -> Instant {
        self.start + Duration::from_millis(self.last_ms.load(Ordering::Relaxed)) + idle
    }
}

/// Resolves once neither direction has read anything for `idle`.
async fn idle_expired(activity: &Activity, idle: Option<Duration>) -> io::Error {
    let Some(idle) = idle else {
        return std::future::pending().await;
    };
    loop {
        let deadline = activity.deadline(idle);
        if Instant::now() >= deadline {
            return io::Error::new(io::ErrorKind::TimedOut, "idle timeout");
        }
        tokio::time::sleep_until(deadline).await;
    }
}

/// Copy chunks from `reader` to `writer` until EOF.
async fn copy_until_eof<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
    activity: &Activity,
    copied: &mut u64,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        activity.touch();
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *copied += n as u64;
    }
}

/// One read, bounded by the idle timeout when set.
pub(crate) async fn read_with_idle<R>(
    reader: &mut R,
    buf: &mut [u8],
    idle: Option<Duration>,
) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match idle {
        Some(limit) => tokio::time::timeout(limit, reader.read(buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "idle timeout"))?,
        None => reader.read(buf).await,
    }
}

/// Pump bytes between `client` and `upstream` until either side closes.
///
/// Returns the byte counts on a clean end-of-stream, or the first I/O error.
pub async fn pump<A, B>(
    client: A,
    upstream: B,
    buffer_size: usize,
    idle: Option<Duration>,
) -> io::Result<PumpStats>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut upstream_rd, mut upstream_wr) = tokio::io::split(upstream);

    let activity = Activity::new();
    let mut stats = PumpStats::default();
    let result = tokio::select! {
        r = copy_until_eof(&mut client_rd, &mut upstream_wr, buffer_size, &activity, &mut stats.to_upstream) => r,
        r = copy_until_eof(&mut upstream_rd, &mut client_wr, buffer_size, &activity, &mut stats.to_client) => r,
        e = idle_expired(&activity, idle) => Err(e),
    };

    // Close both sides whatever the outcome
    let _ = upstream_wr.shutdown().await;
    let _ = client_wr.shutdown().await;

    metrics::bytes_pumped(stats.to_upstream, stats.to_client);
    result.map(|()| stats)
}
