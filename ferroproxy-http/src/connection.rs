//! Per-connection proxy state machine
//!
//! ```text
//! READING_REQUEST -> ADMITTED | DENIED
//! ADMITTED -> CONNECT_TUNNEL -> TUNNELING
//!          -> FORWARDING -> RESPONDING | TUNNELING (WebSocket)
//! * -> CLOSED
//! ```
//!
//! Malformed or truncated requests are abandoned without a response.

use crate::metrics;
use crate::pump::{pump, read_with_idle};
use bytes::{Bytes, BytesMut};
use ferroproxy_common::{
    LimitsConfig, ProxyConfig, ProxyError, ResponseFaultPolicy, Result, TimeoutConfig,
    DEFAULT_HTTP_PORT,
};
use ferroproxy_plugin::{Admission, PluginRegistry, ResponseOutcome};
use ferroproxy_protocol::{
    is_websocket_upgrade, origin_form, parse_connect_target, parse_host_header, status_response,
    Authority, HeadCodec, HttpRequest, RequestHead, CONNECTION_ESTABLISHED,
};
use futures::StreamExt;
use http::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// Everything a connection task needs, shared by all connections
pub struct ConnectionContext {
    pub registry: Arc<PluginRegistry>,
    pub limits: LimitsConfig,
    pub timeouts: TimeoutConfig,
    pub response_faults: ResponseFaultPolicy,
}

impl ConnectionContext {
    pub fn new(registry: Arc<PluginRegistry>, config: &ProxyConfig) -> Self {
        Self {
            registry,
            limits: config.limits.clone(),
            timeouts: config.timeouts.clone(),
            response_faults: config.response_faults,
        }
    }
}

/// A request head read off the wire, plus any bytes that arrived after its body
struct Inbound {
    request: HttpRequest,
    trailing: BytesMut,
}

/// Drive one client connection to completion.
///
/// Returns `Ok(())` for every outcome the protocol defines, including silent
/// abandonment; `Err` is reserved for I/O failures while talking to the client.
pub async fn serve_connection<S>(mut client: S, peer: SocketAddr, ctx: Arc<ConnectionContext>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(Inbound { request, trailing }) = read_request(&mut client, peer, &ctx).await else {
        return Ok(());
    };

    match ctx.registry.execute_request_hooks(&request).await {
        Admission::Allowed => {}
        Admission::Denied { plugin, reason } => {
            info!(plugin = %plugin, reason = %reason, target = %request.path(), "Request denied");
            metrics::request("denied");
            return respond(&mut client, StatusCode::FORBIDDEN).await;
        }
        Admission::Faulted { plugin, error } => {
            warn!(plugin = %plugin, error = %error, "Request hook failed, denying");
            metrics::plugin_fault(&plugin, "request");
            metrics::request("denied");
            return respond(&mut client, StatusCode::FORBIDDEN).await;
        }
    }

    if request.is_connect() {
        return tunnel(client, &request, trailing, &ctx).await;
    }

    let Some(host) = request.header("host").filter(|h| !h.trim().is_empty()) else {
        metrics::request("bad_request");
        return respond(&mut client, StatusCode::BAD_REQUEST).await;
    };
    let authority = parse_host_header(host, DEFAULT_HTTP_PORT);

    forward(client, &request, &authority, &ctx).await
}

/// Read the request head and its `Content-Length` body.
///
/// `None` means the connection is to be dropped without a reply.
async fn read_request<S>(client: &mut S, peer: SocketAddr, ctx: &ConnectionContext) -> Option<Inbound>
where
    S: AsyncRead + Unpin,
{
    let read = async {
        let mut framed = FramedRead::new(
            &mut *client,
            HeadCodec::with_max_head_size(ctx.limits.max_head_bytes),
        );
        let raw_head = match framed.next().await {
            Some(Ok(head)) => head,
            Some(Err(e)) => {
                debug!(error = %e, "Unreadable request head");
                return None;
            }
            None => return None,
        };
        let mut buffered = framed.read_buffer_mut().split();
        drop(framed);

        let parsed = RequestHead::parse(&raw_head)
            .and_then(|head| head.content_length().map(|length| (head, length)));
        let (head, length) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "Malformed request head");
                return None;
            }
        };
        if length > ctx.limits.max_body_bytes {
            debug!(length, limit = ctx.limits.max_body_bytes, "Request body too large");
            return None;
        }

        let body = if buffered.len() >= length {
            buffered.split_to(length)
        } else {
            let mut body = buffered.split();
            let remaining = length - body.len();
            let mut rest = Vec::new();
            let result = (&mut *client)
                .take(remaining as u64)
                .read_to_end(&mut rest)
                .await;
            if result.is_err() || rest.len() < remaining {
                debug!(expected = length, "Request body truncated");
                return None;
            }
            body.extend_from_slice(&rest);
            body
        };

        Some(Inbound {
            request: HttpRequest::new(head, &raw_head, body.freeze(), peer),
            trailing: buffered,
        })
    };

    tokio::time::timeout(ctx.timeouts.head_read(), read)
        .await
        .unwrap_or_else(|_| {
            debug!("Timed out reading request");
            None
        })
}

async fn respond<S>(client: &mut S, status: StatusCode) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    client.write_all(&status_response(status)).await?;
    client.flush().await?;
    let _ = client.shutdown().await;
    Ok(())
}

async fn connect_upstream(authority: &Authority, ctx: &ConnectionContext) -> Result<TcpStream> {
    let connect = TcpStream::connect((authority.host.as_str(), authority.port));
    let stream = tokio::time::timeout(ctx.timeouts.connect(), connect)
        .await
        .map_err(|_| ProxyError::Timeout(format!("connect to {authority}")))?
        .map_err(|e| ProxyError::Upstream(format!("{authority}: {e}")))?;

    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", authority, e);
    }
    Ok(stream)
}

/// Connect upstream or answer `502`; `None` means the client has been answered.
async fn connect_or_502<S>(client: &mut S, authority: &Authority, ctx: &ConnectionContext) -> Result<Option<TcpStream>>
where
    S: AsyncWrite + Unpin,
{
    match connect_upstream(authority, ctx).await {
        Ok(stream) => Ok(Some(stream)),
        Err(e) => {
            warn!(upstream = %authority, error = %e, "Upstream connect failed");
            metrics::upstream_failure();
            respond(client, StatusCode::BAD_GATEWAY).await?;
            Ok(None)
        }
    }
}

async fn tunnel<S>(mut client: S, request: &HttpRequest, trailing: BytesMut, ctx: &ConnectionContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let authority = match parse_connect_target(request.path()) {
        Ok(authority) => authority,
        Err(e) => {
            debug!(error = %e, "Malformed CONNECT target");
            return Ok(());
        }
    };

    let Some(mut upstream) = connect_or_502(&mut client, &authority, ctx).await? else {
        return Ok(());
    };

    client.write_all(CONNECTION_ESTABLISHED).await?;
    client.flush().await?;
    if !trailing.is_empty() {
        upstream.write_all(&trailing).await?;
    }

    metrics::request("tunneled");
    metrics::tunnel_opened("connect");
    debug!(upstream = %authority, "CONNECT tunnel established");
    log_pump(
        pump(client, upstream, ctx.limits.pump_buffer_bytes, ctx.timeouts.idle()).await,
        &authority,
    );
    Ok(())
}

async fn forward<S>(mut client: S, request: &HttpRequest, authority: &Authority, ctx: &ConnectionContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(mut upstream) = connect_or_502(&mut client, authority, ctx).await? else {
        return Ok(());
    };

    let outbound = request.to_upstream_bytes(&origin_form(request.path()));
    upstream.write_all(&outbound).await?;
    upstream.flush().await?;

    // Response head first: a WebSocket upgrade bypasses response hooks
    let mut framed = FramedRead::new(
        &mut upstream,
        HeadCodec::with_max_head_size(ctx.limits.max_head_bytes),
    );
    let head = match framed.next().await {
        Some(Ok(head)) => head,
        Some(Err(e)) => {
            warn!(upstream = %authority, error = %e, "Unreadable upstream response head");
            return Ok(());
        }
        None => {
            warn!(upstream = %authority, "Upstream closed before responding");
            return Ok(());
        }
    };
    let leftover = framed.read_buffer_mut().split();
    drop(framed);

    if is_websocket_upgrade(&head) {
        client.write_all(&head).await?;
        client.write_all(&leftover).await?;
        client.flush().await?;

        metrics::request("tunneled");
        metrics::tunnel_opened("websocket");
        debug!(upstream = %authority, "WebSocket upgrade, switching to raw pump");
        log_pump(
            pump(client, upstream, ctx.limits.pump_buffer_bytes, ctx.timeouts.idle()).await,
            authority,
        );
        return Ok(());
    }

    let mut response = BytesMut::with_capacity(head.len() + leftover.len());
    response.extend_from_slice(&head);
    response.extend_from_slice(&leftover);
    if let Err(e) = read_to_eof(&mut upstream, &mut response, ctx).await {
        warn!(upstream = %authority, error = %e, "Upstream response read failed");
        return Ok(());
    }
    drop(upstream);

    metrics::request("forwarded");
    let response = match ctx
        .registry
        .execute_response_hooks(response.freeze(), request)
        .await
    {
        ResponseOutcome::Complete(bytes) => bytes,
        ResponseOutcome::Degraded { bytes, plugin, error } => {
            metrics::plugin_fault(&plugin, "response");
            match ctx.response_faults {
                ResponseFaultPolicy::ServeLastGood => {
                    warn!(plugin = %plugin, error = %error, "Response hook failed, serving last good response");
                    bytes
                }
                ResponseFaultPolicy::FailClosed => {
                    warn!(plugin = %plugin, error = %error, "Response hook failed, failing closed");
                    return respond(&mut client, StatusCode::BAD_GATEWAY).await;
                }
            }
        }
    };

    write_and_close(&mut client, &response).await
}

async fn read_to_eof(upstream: &mut TcpStream, out: &mut BytesMut, ctx: &ConnectionContext) -> std::io::Result<()> {
    let mut buf = vec![0u8; ctx.limits.pump_buffer_bytes];
    loop {
        let n = read_with_idle(upstream, &mut buf, ctx.timeouts.idle()).await?;
        if n == 0 {
            return Ok(());
        }
        out.extend_from_slice(&buf[..n]);
    }
}

async fn write_and_close<S>(client: &mut S, bytes: &Bytes) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    client.write_all(bytes).await?;
    client.flush().await?;
    let _ = client.shutdown().await;
    Ok(())
}

fn log_pump(result: std::io::Result<crate::pump::PumpStats>, upstream: &Authority) {
    match result {
        Ok(stats) => debug!(
            upstream = %upstream,
            bytes_tx = stats.to_upstream,
            bytes_rx = stats.to_client,
            "Tunnel closed"
        ),
        Err(e) => debug!(upstream = %upstream, error = %e, "Tunnel closed with error"),
    }
}
