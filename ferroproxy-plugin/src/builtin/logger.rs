use crate::traits::*;
use async_trait::async_trait;
use bytes::Bytes;
use ferroproxy_protocol::{response::status_code, HttpRequest};
use tracing::{info, warn};

/// Logs every admitted request and the size of its response
pub struct AccessLogPlugin {
    log_headers: bool,
}

impl AccessLogPlugin {
    pub fn new() -> Self {
        Self { log_headers: false }
    }

    /// Also log request header names at `debug`
    pub fn with_header_logging(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Default for AccessLogPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for AccessLogPlugin {
    fn name(&self) -> &str {
        "access-log"
    }

    fn description(&self) -> &str {
        "Logs requests and response sizes"
    }

    async fn on_request(&self, req: &HttpRequest) -> Result<PluginAction, BoxError> {
        info!(
            method = %req.method(),
            target = %req.path(),
            client = %req.client(),
            body_bytes = req.body().len(),
            "Incoming request"
        );

        if self.log_headers {
            let names: Vec<&str> = req.headers().iter().map(|(name, _)| name).collect();
            tracing::debug!(headers = ?names, "Request headers");
        }

        Ok(PluginAction::Continue)
    }

    async fn on_response(&self, response: Bytes, req: &HttpRequest) -> Result<Bytes, BoxError> {
        match status_code(&response) {
            Some(status) if status < 400 => info!(
                target = %req.path(),
                status,
                bytes = response.len(),
                "Response sent"
            ),
            status => warn!(
                target = %req.path(),
                status = ?status,
                bytes = response.len(),
                "Response sent (error)"
            ),
        }

        Ok(response)
    }
}
