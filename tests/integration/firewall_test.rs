//! Firewall rules applied to live traffic

use ferroproxy::prelude::*;
use ferroproxy_tests::{start_http_upstream, TestProxy};
use std::net::SocketAddr;

const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
const FORBIDDEN: &[u8] = b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n";

fn get(upstream: SocketAddr, path: &str) -> String {
    format!("GET http://{upstream}{path} HTTP/1.1\r\nHost: {upstream}\r\n\r\n")
}

#[tokio::test]
async fn test_unmatched_request_is_allowed() {
    let (upstream, _seen) = start_http_upstream(OK_RESPONSE).await;
    let proxy = TestProxy::start().await;
    proxy.server.firewall().set_rules(vec![
        Rule::deny().with("method", "DELETE"),
        Rule::deny().with("src_ip", "10.0.0.0/8"),
    ]);

    let response = proxy.exchange(get(upstream, "/").as_bytes()).await;

    assert_eq!(response, OK_RESPONSE);
    proxy.stop().await;
}

#[tokio::test]
async fn test_first_matching_rule_wins() {
    let (upstream, _seen) = start_http_upstream(OK_RESPONSE).await;
    let proxy = TestProxy::start().await;
    let port = upstream.port().to_string();
    proxy.server.firewall().set_rules(vec![
        Rule::allow().with("path", "/public"),
        Rule::deny().with("dst_port", port.as_str()),
        Rule::allow().with("path", "/private"),
    ]);

    let public = proxy.exchange(get(upstream, "/public/index.html").as_bytes()).await;
    assert_eq!(public, OK_RESPONSE);

    let private = proxy.exchange(get(upstream, "/private").as_bytes()).await;
    assert_eq!(private, FORBIDDEN);

    proxy.stop().await;
}

#[tokio::test]
async fn test_source_cidr_rule() {
    let (upstream, _seen) = start_http_upstream(OK_RESPONSE).await;
    let proxy = TestProxy::start().await;

    proxy
        .server
        .firewall()
        .set_rules(vec![Rule::deny().with("src", "192.168.50.0/24")]);
    let response = proxy.exchange(get(upstream, "/").as_bytes()).await;
    assert_eq!(response, OK_RESPONSE);

    proxy
        .server
        .firewall()
        .set_rules(vec![Rule::deny().with("src", "127.0.0.0/8")]);
    let response = proxy.exchange(get(upstream, "/").as_bytes()).await;
    assert_eq!(response, FORBIDDEN);

    proxy.stop().await;
}

#[tokio::test]
async fn test_domain_rule_matches_subdomains() {
    let mut config = ProxyConfig::default();
    config.timeouts.connect_secs = 1;
    let proxy = TestProxy::start_with(Server::builder().config(config)).await;
    proxy
        .server
        .firewall()
        .add_rule(Rule::deny().with("host", "blocked.test"), None);

    for host in ["blocked.test", "api.BLOCKED.test"] {
        let request = format!("GET http://{host}/ HTTP/1.1\r\nHost: {host}\r\n\r\n");
        assert_eq!(proxy.exchange(request.as_bytes()).await, FORBIDDEN, "{host}");
    }

    // Not a subdomain: admitted, then fails to resolve upstream
    let request = "GET http://notblocked.test/ HTTP/1.1\r\nHost: notblocked.test\r\n\r\n";
    let response = proxy.exchange(request.as_bytes()).await;
    assert!(response.starts_with(b"HTTP/1.1 502 Bad Gateway"));

    proxy.stop().await;
}

#[tokio::test]
async fn test_shell_edits_apply_to_live_traffic() {
    let (upstream, _seen) = start_http_upstream(OK_RESPONSE).await;
    let proxy = TestProxy::start().await;
    let delete = format!("DELETE http://{upstream}/item HTTP/1.1\r\nHost: {upstream}\r\n\r\n");

    assert_eq!(
        proxy.server.dispatch("rule add deny method=delete desc=\"cleanup\"").as_deref(),
        Some("Rule added: action=deny, description=cleanup, method=delete")
    );
    assert_eq!(proxy.exchange(delete.as_bytes()).await, FORBIDDEN);
    assert_eq!(proxy.exchange(get(upstream, "/item").as_bytes()).await, OK_RESPONSE);

    assert_eq!(
        proxy.server.dispatch("rule del 0").as_deref(),
        Some("Removed rule 0.")
    );
    assert_eq!(proxy.exchange(delete.as_bytes()).await, OK_RESPONSE);

    proxy.stop().await;
}
