use async_trait::async_trait;
use bytes::Bytes;
use ferroproxy_plugin::{command, Admission, BoxError, CommandTable, Plugin, PluginAction, PluginRegistry};
use ferroproxy_protocol::HttpRequest;

/// Example plugin that blocks one path prefix and stamps responses
pub struct HelloPlugin {
    blocked_prefix: String,
}

impl HelloPlugin {
    pub fn new(blocked_prefix: impl Into<String>) -> Self {
        Self {
            blocked_prefix: blocked_prefix.into(),
        }
    }
}

#[async_trait]
impl Plugin for HelloPlugin {
    fn name(&self) -> &str {
        "hello-plugin"
    }

    // Optional: Implement init to perform setup
    async fn init(&mut self) -> Result<(), BoxError> {
        println!("HelloPlugin initialized, blocking {}", self.blocked_prefix);
        Ok(())
    }

    async fn on_request(&self, req: &HttpRequest) -> Result<PluginAction, BoxError> {
        if req.path().starts_with(&self.blocked_prefix) {
            return Ok(PluginAction::deny("blocked by hello-plugin"));
        }
        Ok(PluginAction::Continue)
    }

    async fn on_response(&self, response: Bytes, _req: &HttpRequest) -> Result<Bytes, BoxError> {
        let mut out = response.to_vec();
        out.extend_from_slice(b"\n<!-- hello -->");
        Ok(Bytes::from(out))
    }

    fn commands(&self) -> CommandTable {
        let mut table = CommandTable::new();
        let prefix = self.blocked_prefix.clone();
        table.insert(
            "hello".to_string(),
            command(move |_| Some(format!("hello-plugin blocks {prefix}"))),
        );
        table
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Setup logging
    tracing_subscriber::fmt().init();

    let mut registry = PluginRegistry::new();
    registry.register(HelloPlugin::new("/admin"))?;
    registry.init_all().await?;

    let client = "127.0.0.1:1234".parse()?;
    let blocked = HttpRequest::parse(b"GET /admin HTTP/1.1\r\nHost: example.com\r\n\r\n", client)?;
    let allowed = HttpRequest::parse(b"GET /index HTTP/1.1\r\nHost: example.com\r\n\r\n", client)?;

    println!("Simulating request processing...");
    match registry.execute_request_hooks(&blocked).await {
        Admission::Denied { plugin, reason } => println!("/admin denied by {plugin}: {reason}"),
        other => println!("Unexpected admission: {other:?}"),
    }
    println!("/index admission: {:?}", registry.execute_request_hooks(&allowed).await);

    let response = Bytes::from_static(b"HTTP/1.1 200 OK\r\n\r\nhi");
    let outcome = registry.execute_response_hooks(response, &allowed).await;
    println!("Transformed response: {:?}", outcome.into_bytes());

    println!("{}", registry.dispatch("hello").unwrap_or_default());
    registry.shutdown_all().await;
    Ok(())
}
