// crates/core/src/error.rs
use odoo_inspector_types::PageSessionId;
use thiserror::Error;

/// Failures of the host capabilities (in-page scripting, navigation, icon and
/// tooltip side effects). Always recoverable: callers fall back or log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("page {page_session_id} cannot be scripted: {reason}")]
    Restricted {
        page_session_id: PageSessionId,
        reason: String,
    },

    #[error("host bridge is not connected")]
    Unavailable,

    #[error("host command timed out after {0} ms")]
    Timeout(u64),

    #[error("host command failed: {0}")]
    Command(String),

    #[error("unexpected host reply: {0}")]
    InvalidReply(String),
}

/// Failures seen by a protocol client (the popup side of the protocol).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("protocol transport failed: {0}")]
    Transport(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unexpected response shape for {0}")]
    UnexpectedResponse(&'static str),
}

/// Failures of popup actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PopupError {
    #[error("page is not a recognised target page")]
    NotTarget,

    #[error("inspector cannot be enabled while debug mode is off")]
    InspectorRequiresDebug,

    #[error(transparent)]
    Protocol(#[from] ClientError),

    #[error(transparent)]
    Host(#[from] HostError),
}
