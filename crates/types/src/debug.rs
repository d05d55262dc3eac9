// crates/types/src/debug.rs
//! Debug-state values: what an address says and what the store holds.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Query parameter carrying the desired debug state in a page address.
pub const DEBUG_PARAM: &str = "debug";
/// Marker value for normal debug mode.
pub const DEBUG_VALUE_NORMAL: &str = "1";
/// Marker value for debug mode with unminified assets.
pub const DEBUG_VALUE_ASSETS: &str = "assets";
/// Marker value explicitly switching debug off.
pub const DEBUG_VALUE_OFF: &str = "0";

/// Debug sub-mode. `Assets` only ever exists while debug is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../bindings/"))]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    #[default]
    Normal,
    Assets,
}

impl DebugMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Assets => "assets",
        }
    }

    /// Value written into the address marker when debug is enabled in this mode.
    pub fn marker_value(&self) -> &'static str {
        match self {
            Self::Normal => DEBUG_VALUE_NORMAL,
            Self::Assets => DEBUG_VALUE_ASSETS,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "assets" => Some(Self::Assets),
            _ => None,
        }
    }
}

/// Debug state encoded in a page address. Only produced when the address
/// carries a recognised marker; "no marker" is represented by `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../bindings/"))]
pub struct DebugStateFragment {
    pub enabled: bool,
    pub mode: DebugMode,
}

impl DebugStateFragment {
    pub const OFF: Self = Self {
        enabled: false,
        mode: DebugMode::Normal,
    };

    /// Map a raw marker value to a fragment. Unknown values carry no opinion.
    pub fn from_marker(value: &str) -> Option<Self> {
        match value {
            DEBUG_VALUE_ASSETS => Some(Self {
                enabled: true,
                mode: DebugMode::Assets,
            }),
            DEBUG_VALUE_NORMAL => Some(Self {
                enabled: true,
                mode: DebugMode::Normal,
            }),
            DEBUG_VALUE_OFF => Some(Self::OFF),
            _ => None,
        }
    }
}

/// Per-page debug state held by the background process.
///
/// Construction normalises `mode` to `Normal` whenever `enabled` is false, so
/// no record can ever claim assets mode with debug switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RecordParts")]
pub struct PageDebugRecord {
    enabled: bool,
    mode: DebugMode,
}

#[derive(Deserialize)]
struct RecordParts {
    enabled: bool,
    #[serde(default)]
    mode: DebugMode,
}

impl From<RecordParts> for PageDebugRecord {
    fn from(parts: RecordParts) -> Self {
        Self::new(parts.enabled, parts.mode)
    }
}

impl PageDebugRecord {
    pub const DISABLED: Self = Self {
        enabled: false,
        mode: DebugMode::Normal,
    };

    pub fn new(enabled: bool, mode: DebugMode) -> Self {
        Self {
            enabled,
            mode: if enabled { mode } else { DebugMode::Normal },
        }
    }

    pub fn enabled(mode: DebugMode) -> Self {
        Self::new(true, mode)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode(&self) -> DebugMode {
        self.mode
    }
}

impl From<DebugStateFragment> for PageDebugRecord {
    fn from(fragment: DebugStateFragment) -> Self {
        Self::new(fragment.enabled, fragment.mode)
    }
}
