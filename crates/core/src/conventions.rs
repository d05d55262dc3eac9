// crates/core/src/conventions.rs
//! Tables describing what the target application's pages look like, plus the
//! auto-enable policy. Loaded from the worker's config file; the defaults
//! describe stock deployments.

use odoo_inspector_types::{ContextVerdict, InterfaceKind};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeSpec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConventions {
    /// Hostname substrings of known hosted deployments.
    pub target_hosts: Vec<String>,
    /// First path segments of the backend interface.
    pub backend_segments: Vec<String>,
    /// Reserved point-of-sale segment.
    pub pos_segment: String,
    /// Segments that, directly after `pos_segment` anywhere in the path, mark
    /// a nested point-of-sale client (`/x/pos/ui`).
    pub pos_subpaths: Vec<String>,
    /// Query parameters only the point-of-sale client uses.
    pub pos_query_params: Vec<String>,
    /// Query parameters of the backend's navigation model.
    pub navigation_query_params: Vec<String>,
    /// Fragment substrings of the backend's navigation model.
    pub navigation_fragment_markers: Vec<String>,
    /// In-page probe.
    pub probe: ProbeSpec,
}

impl Default for TargetConventions {
    fn default() -> Self {
        Self {
            target_hosts: strings(&["odoo.com", "odoo.sh", "runbot"]),
            backend_segments: strings(&["web", "odoo"]),
            pos_segment: "pos".into(),
            pos_subpaths: strings(&["ui", "web"]),
            pos_query_params: strings(&["config_id"]),
            navigation_query_params: strings(&["debug", "menu_id", "action", "model", "view_type"]),
            navigation_fragment_markers: strings(&["cids=", "action=", "model="]),
            probe: ProbeSpec::default(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// When a recognised page gets debug switched on without the user asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoEnablePolicy {
    pub backend: bool,
    pub pos: bool,
    pub website: bool,
}

impl Default for AutoEnablePolicy {
    fn default() -> Self {
        Self {
            backend: true,
            pos: true,
            website: false,
        }
    }
}

impl AutoEnablePolicy {
    /// Whether a page with this verdict should get debug turned on by itself.
    pub fn allows(&self, verdict: &ContextVerdict) -> bool {
        if !verdict.is_target {
            return false;
        }
        match verdict.interface_kind {
            InterfaceKind::Backend => self.backend,
            InterfaceKind::Pos => self.pos,
            InterfaceKind::Website => self.website,
            InterfaceKind::Unknown => false,
        }
    }
}
