//! Plain request forwarding

use ferroproxy::plugin::builtin::Rule;
use ferroproxy_tests::{free_addr, start_counting_upstream, start_http_upstream, TestProxy};
use std::sync::atomic::Ordering;
use std::time::Duration;

const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";

#[tokio::test]
async fn test_denied_request_never_reaches_upstream() {
    let (upstream, accepted) = start_counting_upstream().await;
    let proxy = TestProxy::start().await;
    proxy
        .server
        .firewall()
        .add_rule(Rule::deny().with("dst_port", upstream.port().to_string()), None);

    let request = format!("GET http://{upstream}/ HTTP/1.1\r\nHost: {upstream}\r\n\r\n");
    let response = proxy.exchange(request.as_bytes()).await;

    assert_eq!(response, b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 0);

    proxy.stop().await;
}

#[tokio::test]
async fn test_absolute_target_forwarded_in_origin_form() {
    let (upstream, mut seen) = start_http_upstream(OK_RESPONSE).await;
    let proxy = TestProxy::start().await;

    let request = format!(
        "GET http://{upstream}/index.html?q=1 HTTP/1.1\r\nHost: {upstream}\r\nX-Trace: abc\r\n\r\n"
    );
    let response = proxy.exchange(request.as_bytes()).await;
    assert_eq!(response, OK_RESPONSE);

    let head = String::from_utf8(seen.recv().await.unwrap()).unwrap();
    assert!(head.starts_with("GET /index.html?q=1 HTTP/1.1\r\n"), "{head}");
    assert!(head.contains(&format!("host: {upstream}\r\n")));
    assert!(head.contains("x-trace: abc\r\n"));

    proxy.stop().await;
}

#[tokio::test]
async fn test_request_body_forwarded() {
    let (upstream, mut seen) = start_http_upstream(OK_RESPONSE).await;
    let proxy = TestProxy::start().await;

    let request = format!(
        "POST http://{upstream}/submit HTTP/1.1\r\nHost: {upstream}\r\nContent-Length: 4\r\n\r\nping"
    );
    let response = proxy.exchange(request.as_bytes()).await;
    assert_eq!(response, OK_RESPONSE);

    let forwarded = String::from_utf8(seen.recv().await.unwrap()).unwrap();
    assert!(forwarded.starts_with("POST /submit HTTP/1.1\r\n"));
    assert!(forwarded.contains("content-length: 4\r\n"));
    assert!(forwarded.ends_with("\r\n\r\nping"));

    proxy.stop().await;
}

#[tokio::test]
async fn test_unreachable_upstream_gets_502() {
    let proxy = TestProxy::start().await;
    let dead = free_addr();

    let request = format!("GET http://{dead}/ HTTP/1.1\r\nHost: {dead}\r\n\r\n");
    let response = proxy.exchange(request.as_bytes()).await;

    assert_eq!(response, b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 0\r\n\r\n");
    proxy.stop().await;
}

#[tokio::test]
async fn test_missing_host_gets_400() {
    let proxy = TestProxy::start().await;

    let response = proxy.exchange(b"GET /local HTTP/1.1\r\n\r\n").await;

    assert!(response.starts_with(b"HTTP/1.1 400 Bad Request"));
    proxy.stop().await;
}

#[tokio::test]
async fn test_malformed_request_line_closes_silently() {
    let proxy = TestProxy::start().await;

    let response = proxy.exchange(b"NONSENSE\r\nHost: example.org\r\n\r\n").await;

    assert!(response.is_empty());
    proxy.stop().await;
}
