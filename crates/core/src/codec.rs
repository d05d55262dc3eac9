// crates/core/src/codec.rs
//! Address ⇄ debug-state codec.
//!
//! The target application has used two address conventions over its history:
//! - new-style (`/odoo/...`): the marker is an ordinary query parameter.
//! - legacy (`/web...`): the marker must be the first query parameter right
//!   after the `/web` segment.
//!
//! Everything else is handled like new-style. All functions are total: an
//! address that cannot be parsed yields `None` / comes back unchanged.

use odoo_inspector_types::{DebugMode, DebugStateFragment, DEBUG_PARAM, DEBUG_VALUE_ASSETS, DEBUG_VALUE_NORMAL};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use url::Url;

/// Path segment identifying new-style addresses.
pub const NEW_STYLE_SEGMENT: &str = "odoo";
/// Path segment identifying legacy addresses; the marker is anchored here.
pub const LEGACY_SEGMENT: &str = "web";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppVersion {
    NewStyle,
    Legacy,
    Unknown,
}

/// Detect which address convention `address` follows.
pub fn detect_app_version(address: &str) -> AppVersion {
    match Url::parse(address) {
        Ok(url) => version_of(&url),
        Err(_) => AppVersion::Unknown,
    }
}

pub(crate) fn version_of(url: &Url) -> AppVersion {
    let segments = path_segments(url);
    if segments.iter().any(|s| *s == NEW_STYLE_SEGMENT) {
        AppVersion::NewStyle
    } else if segments.iter().any(|s| *s == LEGACY_SEGMENT) {
        AppVersion::Legacy
    } else {
        AppVersion::Unknown
    }
}

/// Non-empty path segments of `url` (empty for cannot-be-a-base URLs).
pub(crate) fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Read the debug marker. `None` means the address expresses no opinion;
/// an explicit `debug=0` is a real answer (`enabled: false`).
pub fn parse_debug_fragment(address: &str) -> Option<DebugStateFragment> {
    let url = Url::parse(address).ok()?;
    fragment_of(&url)
}

pub(crate) fn fragment_of(url: &Url) -> Option<DebugStateFragment> {
    let (_, value) = url.query_pairs().find(|(key, _)| key == DEBUG_PARAM)?;
    DebugStateFragment::from_marker(&value)
}

/// `true` when the marker is `1` or `assets`.
pub fn has_active_debug_marker(address: &str) -> bool {
    Url::parse(address)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == DEBUG_PARAM)
                .map(|(_, v)| v == DEBUG_VALUE_NORMAL || v == DEBUG_VALUE_ASSETS)
        })
        .unwrap_or(false)
}

/// `true` when the address carries `debug=0`.
pub fn is_debug_explicitly_disabled(address: &str) -> bool {
    parse_debug_fragment(address) == Some(DebugStateFragment::OFF)
}

/// Add or remove the debug marker, following the convention the address uses.
pub fn write_debug_fragment(address: &str, enabled: bool, mode: DebugMode) -> String {
    match Url::parse(address) {
        Ok(url) => {
            let version = version_of(&url);
            rewrite(url, enabled, mode, version).unwrap_or_else(|| address.to_string())
        }
        Err(e) => {
            tracing::debug!(address, error = %e, "address not rewritten: unparseable");
            address.to_string()
        }
    }
}

/// Like [`write_debug_fragment`] but with the convention supplied by the caller.
pub fn write_debug_fragment_as(
    address: &str,
    enabled: bool,
    mode: DebugMode,
    version: AppVersion,
) -> String {
    match Url::parse(address) {
        Ok(url) => rewrite(url, enabled, mode, version).unwrap_or_else(|| address.to_string()),
        Err(e) => {
            tracing::debug!(address, error = %e, "address not rewritten: unparseable");
            address.to_string()
        }
    }
}

/// Returns `None` when the address must be left exactly as it was.
fn rewrite(mut url: Url, enabled: bool, mode: DebugMode, version: AppVersion) -> Option<String> {
    if url.cannot_be_a_base() {
        return None;
    }
    let has_marker = url.query_pairs().any(|(key, _)| key == DEBUG_PARAM);
    if !enabled && !has_marker {
        return None;
    }

    let others: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != DEBUG_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let marker = (DEBUG_PARAM.to_string(), mode.marker_value().to_string());

    let pairs = match (version, enabled) {
        (AppVersion::Legacy, true) => {
            if let Some(base) = legacy_base_path(&url) {
                url.set_path(&base);
            }
            let mut pairs = Vec::with_capacity(others.len() + 1);
            pairs.push(marker);
            pairs.extend(others);
            pairs
        }
        (_, true) => {
            let mut pairs = others;
            pairs.push(marker);
            pairs
        }
        (_, false) => others,
    };

    set_query_pairs(&mut url, &pairs);
    Some(url.to_string())
}

/// Path up to and including the first legacy segment, e.g.
/// `/shop/web/login` → `/shop/web`.
fn legacy_base_path(url: &Url) -> Option<String> {
    let segments = path_segments(url);
    let idx = segments.iter().position(|s| *s == LEGACY_SEGMENT)?;
    Some(format!("/{}", segments[..=idx].join("/")))
}

fn set_query_pairs(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        url.set_query(None);
        return;
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    url.set_query(Some(&query));
}
