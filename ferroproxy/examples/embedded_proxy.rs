//! Example: Embedded `FerroProxy` server
//!
//! Runs a proxy with a small rule set and a custom plugin that tags every
//! response passing through it.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example embedded_proxy -- --listen 127.0.0.1:3128
//!
//! # In another shell
//! curl -x http://127.0.0.1:3128 http://example.com/
//! curl -x http://127.0.0.1:3128 http://blocked.example/   # 403
//! ```

use async_trait::async_trait;
use ferroproxy::prelude::*;
use std::env;

/// Adds a marker header to every relayed response
struct ViaHeader;

#[async_trait]
impl Plugin for ViaHeader {
    fn name(&self) -> &str {
        "via-header"
    }

    async fn on_response(
        &self,
        response: bytes::Bytes,
        _req: &HttpRequest,
    ) -> std::result::Result<bytes::Bytes, BoxError> {
        let Some(end) = response.windows(2).position(|w| w == b"\r\n") else {
            return Ok(response);
        };
        let mut out = Vec::with_capacity(response.len() + 24);
        out.extend_from_slice(&response[..end + 2]);
        out.extend_from_slice(b"Via: 1.1 ferroproxy\r\n");
        out.extend_from_slice(&response[end + 2..]);
        Ok(out.into())
    }
}

#[tokio::main]
async fn main() -> ferroproxy::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info,ferroproxy_http=debug")
        .init();

    let args: Vec<String> = env::args().collect();
    let listen = get_arg(&args, "--listen").unwrap_or_else(|| "127.0.0.1:3128".to_string());

    let mut config = ProxyConfig::default();
    config.listen = listen
        .parse()
        .map_err(|e| ProxyError::Config(format!("invalid --listen: {e}")))?;

    let server = Server::builder()
        .config(config)
        .plugin(ViaHeader)
        .build()
        .await?;

    server
        .firewall()
        .add_rule(Rule::deny().with("domain", "blocked.example"), None);
    server
        .firewall()
        .add_rule(Rule::deny().with("dst_port", "25"), None);

    println!("{}", server.dispatch("show rules").unwrap_or_default());
    println!("Press Ctrl+C to stop");

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

fn get_arg(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1).cloned())
}
