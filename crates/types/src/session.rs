// crates/types/src/session.rs
use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Opaque host-assigned identifier for one page over its navigation lifetime
/// (a browser tab id, in practice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../bindings/"))]
#[serde(transparent)]
pub struct PageSessionId(#[ts(type = "number")] pub u64);

impl PageSessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for PageSessionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PageSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
