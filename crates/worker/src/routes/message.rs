// crates/worker/src/routes/message.rs
use axum::{body::Bytes, extract::State, Json};
use odoo_inspector_types::{ProtocolError, ProtocolResponse};
use serde_json::Value;

use crate::state::WorkerState;

/// `POST /message`: one protocol request in, one protocol response out.
///
/// Always 200; failures are reported in the body as `{"error": ...}`. The body
/// is taken raw so a non-JSON payload still gets an in-band answer.
pub async fn message(State(state): State<WorkerState>, body: Bytes) -> Json<ProtocolResponse> {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "protocol body is not JSON");
            return Json(ProtocolResponse::error(&ProtocolError::Malformed(e.to_string())));
        }
    };
    Json(state.protocol.handle_value(&value).await)
}
