// crates/types/src/protocol.rs
//! Wire format of the synchronization protocol between the transient popup
//! and the background process.
//!
//! Requests are JSON objects tagged by `type`. Every request gets exactly one
//! response; failures travel in-band as `{"error": "..."}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use ts_rs::TS;

use crate::debug::{DebugMode, PageDebugRecord};
use crate::session::PageSessionId;

pub const SET_DEBUG_STATE: &str = "SET_DEBUG_STATE";
pub const GET_DEBUG_STATE: &str = "GET_DEBUG_STATE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../bindings/"))]
#[serde(tag = "type")]
pub enum ProtocolRequest {
    #[serde(rename = "SET_DEBUG_STATE")]
    SetDebugState {
        #[serde(rename = "pageSessionId")]
        page_session_id: PageSessionId,
        enabled: bool,
        #[serde(default)]
        mode: DebugMode,
    },
    #[serde(rename = "GET_DEBUG_STATE")]
    GetDebugState {
        #[serde(rename = "pageSessionId")]
        page_session_id: PageSessionId,
    },
}

impl ProtocolRequest {
    pub fn set(page_session_id: PageSessionId, enabled: bool, mode: DebugMode) -> Self {
        Self::SetDebugState {
            page_session_id,
            enabled,
            mode,
        }
    }

    pub fn get(page_session_id: PageSessionId) -> Self {
        Self::GetDebugState { page_session_id }
    }

    pub fn page_session_id(&self) -> PageSessionId {
        match self {
            Self::SetDebugState { page_session_id, .. }
            | Self::GetDebugState { page_session_id } => *page_session_id,
        }
    }

    /// Decode an untrusted JSON message, distinguishing the failure kinds the
    /// popup needs to tell apart (unknown type vs. missing id vs. garbage).
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let Some(obj) = value.as_object() else {
            return Err(ProtocolError::Malformed("message is not an object".into()));
        };
        let Some(kind) = obj.get("type").and_then(Value::as_str) else {
            return Err(ProtocolError::Malformed("message has no type".into()));
        };
        if kind != SET_DEBUG_STATE && kind != GET_DEBUG_STATE {
            return Err(ProtocolError::UnknownType(kind.to_string()));
        }
        if obj.get("pageSessionId").map_or(true, Value::is_null) {
            return Err(ProtocolError::MissingId);
        }
        Self::deserialize(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// Response to a protocol request. Untagged: the shape tells the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../bindings/"))]
#[serde(untagged)]
pub enum ProtocolResponse {
    Ack { success: bool },
    State { enabled: bool, mode: DebugMode },
    Error { error: String },
}

impl ProtocolResponse {
    pub fn ack() -> Self {
        Self::Ack { success: true }
    }

    pub fn state(record: PageDebugRecord) -> Self {
        Self::State {
            enabled: record.is_enabled(),
            mode: record.mode(),
        }
    }

    pub fn error(err: &ProtocolError) -> Self {
        Self::Error {
            error: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Request-level failures. `Display` is the exact wire text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown type")]
    UnknownType(String),

    #[error("missing id")]
    MissingId,

    #[error("invalid message")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_set_defaults_mode() {
        let req = ProtocolRequest::from_value(&json!({
            "type": "SET_DEBUG_STATE",
            "pageSessionId": 7,
            "enabled": true,
        }))
        .unwrap();
        assert_eq!(req, ProtocolRequest::set(PageSessionId(7), true, DebugMode::Normal));
    }

    #[test]
    fn test_decode_get() {
        let req = ProtocolRequest::from_value(&json!({
            "type": "GET_DEBUG_STATE",
            "pageSessionId": 3,
        }))
        .unwrap();
        assert_eq!(req, ProtocolRequest::get(PageSessionId(3)));
        assert_eq!(req.page_session_id(), PageSessionId(3));
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = ProtocolRequest::from_value(&json!({"type": "PING", "pageSessionId": 1}))
            .unwrap_err();
        assert_eq!(err, ProtocolError::UnknownType("PING".into()));
        assert_eq!(err.to_string(), "unknown type");
    }

    #[test]
    fn test_decode_missing_id() {
        let err = ProtocolRequest::from_value(&json!({"type": "GET_DEBUG_STATE"})).unwrap_err();
        assert_eq!(err, ProtocolError::MissingId);

        let err = ProtocolRequest::from_value(&json!({
            "type": "SET_DEBUG_STATE",
            "pageSessionId": null,
            "enabled": true,
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "missing id");
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            ProtocolRequest::from_value(&json!("SET_DEBUG_STATE")),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ProtocolRequest::from_value(&json!({
                "type": "SET_DEBUG_STATE",
                "pageSessionId": 1,
                "enabled": "yes",
            })),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(
            serde_json::to_value(ProtocolResponse::ack()).unwrap(),
            json!({"success": true})
        );
        assert_eq!(
            serde_json::to_value(ProtocolResponse::state(PageDebugRecord::enabled(
                DebugMode::Assets
            )))
            .unwrap(),
            json!({"enabled": true, "mode": "assets"})
        );
        assert_eq!(
            serde_json::to_value(ProtocolResponse::error(&ProtocolError::MissingId)).unwrap(),
            json!({"error": "missing id"})
        );
    }

    #[test]
    fn test_response_roundtrip_untagged() {
        let resp: ProtocolResponse =
            serde_json::from_value(json!({"error": "unknown type"})).unwrap();
        assert!(resp.is_error());
        let resp: ProtocolResponse =
            serde_json::from_value(json!({"enabled": false, "mode": "normal"})).unwrap();
        assert_eq!(resp, ProtocolResponse::state(PageDebugRecord::DISABLED));
    }
}
