//! Plugin pipeline and rule persistence through the server facade

use async_trait::async_trait;
use bytes::Bytes;
use ferroproxy::plugin::{command, CommandTable};
use ferroproxy::prelude::*;
use ferroproxy_tests::{start_http_upstream, TestProxy};
use tempfile::TempDir;

const OK_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";

/// Uppercases every relayed response
struct Shout;

#[async_trait]
impl Plugin for Shout {
    fn name(&self) -> &str {
        "shout"
    }

    async fn on_response(&self, response: Bytes, _req: &HttpRequest) -> std::result::Result<Bytes, BoxError> {
        Ok(response.to_ascii_uppercase().into())
    }
}

/// Fails every request hook
struct Broken;

#[async_trait]
impl Plugin for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    async fn on_request(&self, _req: &HttpRequest) -> std::result::Result<PluginAction, BoxError> {
        Err("backend unavailable".into())
    }
}

/// Contributes a command that clashes with the firewall shell
struct ShowClash;

#[async_trait]
impl Plugin for ShowClash {
    fn name(&self) -> &str {
        "show-clash"
    }

    fn commands(&self) -> CommandTable {
        let mut table = CommandTable::new();
        table.insert("show".into(), command(|_| Some("mine".into())));
        table
    }
}

/// Requires a collaborator nobody registers
struct Lonely;

#[async_trait]
impl Plugin for Lonely {
    fn name(&self) -> &str {
        "lonely"
    }

    fn requires(&self) -> &[&'static str] {
        &["metrics-sink"]
    }
}

#[tokio::test]
async fn test_response_hook_transforms_relayed_bytes() {
    let (upstream, _seen) = start_http_upstream(OK_RESPONSE).await;
    let proxy = TestProxy::start_with(Server::builder().plugin(Shout)).await;

    let request = format!("GET http://{upstream}/ HTTP/1.1\r\nHost: {upstream}\r\n\r\n");
    let response = proxy.exchange(request.as_bytes()).await;

    assert_eq!(response, b"HTTP/1.1 200 OK\r\nCONTENT-LENGTH: 5\r\n\r\nHELLO");
    proxy.stop().await;
}

#[tokio::test]
async fn test_faulting_request_hook_denies() {
    let (upstream, _seen) = start_http_upstream(OK_RESPONSE).await;
    let proxy = TestProxy::start_with(Server::builder().plugin(Broken)).await;

    let request = format!("GET http://{upstream}/ HTTP/1.1\r\nHost: {upstream}\r\n\r\n");
    let response = proxy.exchange(request.as_bytes()).await;

    assert_eq!(response, b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n");
    proxy.stop().await;
}

#[tokio::test]
async fn test_configuration_faults_abort_startup() {
    struct Impostor;

    #[async_trait]
    impl Plugin for Impostor {
        fn name(&self) -> &str {
            "access-log"
        }
    }

    let err = Server::builder().plugin(Impostor).build().await.unwrap_err();
    assert!(matches!(err, ProxyError::DuplicatePlugin(name) if name == "access-log"));

    let err = Server::builder().plugin(ShowClash).build().await.unwrap_err();
    assert!(matches!(
        err,
        ProxyError::DuplicateCommand { ref command, ref plugin } if command == "show" && plugin == "show-clash"
    ));

    let err = Server::builder().plugin(Lonely).build().await.unwrap_err();
    assert!(matches!(
        err,
        ProxyError::MissingDependency { ref plugin, ref requires } if plugin == "lonely" && requires == "metrics-sink"
    ));
}

#[tokio::test]
async fn test_rules_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.toml");

    let first = Server::builder().rules_file(&path).build().await.unwrap();
    assert!(first.firewall().is_empty());
    first.dispatch("rule add deny src_ip=192.168.50.0/24 port=8443");
    first.dispatch("rule add allow domain=example.com");
    first.dispatch("rule add deny path=/admin");
    assert_eq!(
        first.dispatch("write memory"),
        Some(format!("Firewall rules saved to {}", path.display()))
    );
    first.registry().shutdown_all().await;

    let second = Server::builder().rules_file(&path).build().await.unwrap();
    assert_eq!(second.firewall().get_rules(), first.firewall().get_rules());
    assert_eq!(
        second.dispatch("show rules").as_deref(),
        Some(
            "0: action=deny, dst_port=8443, src_ip=192.168.50.0/24\n\
             1: action=allow, domain=example.com\n\
             2: action=deny, path=/admin"
        )
    );

    assert_eq!(
        second.dispatch("reset-config").as_deref(),
        Some("Cleared firewall rules")
    );
    assert!(second.firewall().is_empty());
    second.dispatch("load-config");
    assert_eq!(second.firewall().len(), 3);
}
