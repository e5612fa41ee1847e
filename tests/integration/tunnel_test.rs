//! CONNECT tunnels and WebSocket pass-through

use async_trait::async_trait;
use bytes::Bytes;
use ferroproxy::prelude::*;
use ferroproxy_tests::{start_echo_upstream, start_websocket_upstream, TestProxy, SWITCHING_PROTOCOLS};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

#[tokio::test]
async fn test_connect_tunnel_pumps_both_ways() {
    let upstream = start_echo_upstream().await;
    let proxy = TestProxy::start().await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    let request = format!("CONNECT {upstream} HTTP/1.1\r\nHost: {upstream}\r\n\r\n");
    client.write_all(request.as_bytes()).await.unwrap();

    let mut established = vec![0u8; ESTABLISHED.len()];
    client.read_exact(&mut established).await.unwrap();
    assert_eq!(established, ESTABLISHED);

    for message in [&b"first"[..], b"second message", b"\x00\xffbinary\x80"] {
        client.write_all(message).await.unwrap();
        let mut echoed = vec![0u8; message.len()];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(echoed, message);
    }

    // Closing our side tears down the tunnel
    client.shutdown().await.unwrap();
    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert!(rest.is_empty());

    proxy.stop().await;
}

#[tokio::test]
async fn test_connect_denied_by_protocol_rule() {
    let upstream = start_echo_upstream().await;
    let proxy = TestProxy::start().await;
    proxy
        .server
        .firewall()
        .add_rule(Rule::deny().with("proto", "TCP"), None);

    let request = format!("CONNECT {upstream} HTTP/1.1\r\nHost: {upstream}\r\n\r\n");
    let response = proxy.exchange(request.as_bytes()).await;

    assert_eq!(response, b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n");
    proxy.stop().await;
}

/// Counts response hook invocations
struct ResponseCounter(Arc<AtomicUsize>);

#[async_trait]
impl Plugin for ResponseCounter {
    fn name(&self) -> &str {
        "response-counter"
    }

    async fn on_response(&self, response: Bytes, _req: &HttpRequest) -> std::result::Result<Bytes, BoxError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(response)
    }
}

#[tokio::test]
async fn test_websocket_upgrade_switches_to_raw_pump() {
    let upstream = start_websocket_upstream().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let proxy = TestProxy::start_with(
        Server::builder().plugin(ResponseCounter(calls.clone())),
    )
    .await;

    let mut client = TcpStream::connect(proxy.addr).await.unwrap();
    let request = format!(
        "GET http://{upstream}/chat HTTP/1.1\r\n\
         Host: {upstream}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n"
    );
    client.write_all(request.as_bytes()).await.unwrap();

    let mut head = vec![0u8; SWITCHING_PROTOCOLS.len()];
    client.read_exact(&mut head).await.unwrap();
    assert_eq!(head, SWITCHING_PROTOCOLS);

    // Masked text frame "hi"; the upstream echoes it back untouched
    let frame = [0x81, 0x82, 0x01, 0x02, 0x03, 0x04, b'h' ^ 0x01, b'i' ^ 0x02];
    client.write_all(&frame).await.unwrap();
    let mut echoed = [0u8; 8];
    client.read_exact(&mut echoed).await.unwrap();
    assert_eq!(echoed, frame);

    drop(client);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    proxy.stop().await;
}
