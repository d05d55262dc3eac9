// crates/worker/src/client.rs
//! Protocol client for popups running outside the worker process.

use async_trait::async_trait;
use odoo_inspector_core::{ClientError, ProtocolClient};
use odoo_inspector_types::{ProtocolRequest, ProtocolResponse};

/// Talks to a running worker's `POST /message`.
#[derive(Clone)]
pub struct HttpProtocolClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpProtocolClient {
    /// `base_url` is the worker root, e.g. `http://127.0.0.1:47894`.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/message", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProtocolClient for HttpProtocolClient {
    async fn request(&self, request: ProtocolRequest) -> Result<ProtocolResponse, ClientError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        response
            .json::<ProtocolResponse>()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }
}
