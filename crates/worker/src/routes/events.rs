// crates/worker/src/routes/events.rs
//! Host navigation lifecycle events.

use axum::{extract::State, http::StatusCode, Json};
use odoo_inspector_core::{NavigationEvent, Resolution};
use odoo_inspector_types::PageSessionId;
use serde::{Deserialize, Serialize};

use crate::state::WorkerState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressChangedResponse {
    /// `false` when the event was skipped (non-web page, or a partial load
    /// that did not move).
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

/// `POST /events/address-changed`
pub async fn address_changed(
    State(state): State<WorkerState>,
    Json(event): Json<NavigationEvent>,
) -> Json<AddressChangedResponse> {
    let resolution = state.reconciler.on_address_changed(&event).await;
    Json(AddressChangedResponse {
        handled: resolution.is_some(),
        resolution,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClosed {
    pub page_session_id: PageSessionId,
}

/// `POST /events/session-closed`
pub async fn session_closed(
    State(state): State<WorkerState>,
    Json(body): Json<SessionClosed>,
) -> StatusCode {
    state.reconciler.on_session_closed(body.page_session_id).await;
    tracing::debug!(page_session_id = %body.page_session_id, "page session closed");
    StatusCode::NO_CONTENT
}
