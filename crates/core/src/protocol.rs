// crates/core/src/protocol.rs
//! Protocol dispatch (background side) and the protocol client seam
//! (popup side).

use std::sync::Arc;

use async_trait::async_trait;
use odoo_inspector_types::{
    DebugMode, PageDebugRecord, PageSessionId, ProtocolRequest, ProtocolResponse,
};
use serde_json::Value;

use crate::error::ClientError;
use crate::service::DebugStateService;

/// Answers protocol requests against the state service. Every request gets
/// exactly one response; failures are in-band.
#[derive(Clone)]
pub struct ProtocolHandler {
    service: Arc<DebugStateService>,
}

impl ProtocolHandler {
    pub fn new(service: Arc<DebugStateService>) -> Self {
        Self { service }
    }

    /// Entry point for untrusted JSON.
    pub async fn handle_value(&self, message: &Value) -> ProtocolResponse {
        match ProtocolRequest::from_value(message) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                tracing::debug!(error = ?e, "protocol request rejected");
                ProtocolResponse::error(&e)
            }
        }
    }

    pub async fn handle(&self, request: ProtocolRequest) -> ProtocolResponse {
        match request {
            ProtocolRequest::SetDebugState {
                page_session_id,
                enabled,
                mode,
            } => {
                self.service.set(page_session_id, enabled, mode).await;
                ProtocolResponse::ack()
            }
            ProtocolRequest::GetDebugState { page_session_id } => {
                ProtocolResponse::state(self.service.get(page_session_id).await)
            }
        }
    }
}

/// How a popup talks to the background process.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn request(&self, request: ProtocolRequest) -> Result<ProtocolResponse, ClientError>;

    async fn set_state(
        &self,
        id: PageSessionId,
        enabled: bool,
        mode: DebugMode,
    ) -> Result<(), ClientError> {
        match self.request(ProtocolRequest::set(id, enabled, mode)).await? {
            ProtocolResponse::Ack { success: true } => Ok(()),
            ProtocolResponse::Error { error } => Err(ClientError::Rejected(error)),
            _ => Err(ClientError::UnexpectedResponse("SET_DEBUG_STATE")),
        }
    }

    async fn get_state(&self, id: PageSessionId) -> Result<PageDebugRecord, ClientError> {
        match self.request(ProtocolRequest::get(id)).await? {
            ProtocolResponse::State { enabled, mode } => Ok(PageDebugRecord::new(enabled, mode)),
            ProtocolResponse::Error { error } => Err(ClientError::Rejected(error)),
            _ => Err(ClientError::UnexpectedResponse("GET_DEBUG_STATE")),
        }
    }
}

/// In-process client, for popups hosted by the background process itself.
#[derive(Clone)]
pub struct LocalProtocolClient {
    handler: ProtocolHandler,
}

impl LocalProtocolClient {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl ProtocolClient for LocalProtocolClient {
    async fn request(&self, request: ProtocolRequest) -> Result<ProtocolResponse, ClientError> {
        Ok(self.handler.handle(request).await)
    }
}
