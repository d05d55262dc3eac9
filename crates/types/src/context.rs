// crates/types/src/context.rs
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Which face of the target application a page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../bindings/"))]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Backend,
    Website,
    Pos,
    Unknown,
}

/// Classification result for one page. Never stored: page content may change
/// between navigations, so it is recomputed on every request.
///
/// Uses camelCase so the popup sees the same field names as the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct ContextVerdict {
    pub is_target: bool,
    pub interface_kind: InterfaceKind,
    pub is_special_mode: bool,
}

impl ContextVerdict {
    pub const NOT_TARGET: Self = Self {
        is_target: false,
        interface_kind: InterfaceKind::Unknown,
        is_special_mode: false,
    };

    pub const POS: Self = Self {
        is_target: true,
        interface_kind: InterfaceKind::Pos,
        is_special_mode: true,
    };

    pub fn target(interface_kind: InterfaceKind) -> Self {
        Self {
            is_target: true,
            interface_kind,
            is_special_mode: interface_kind == InterfaceKind::Pos,
        }
    }
}
