// crates/core/src/probe.rs
//! DOM probe model.
//!
//! A probe is data: the host ships a [`ProbeSpec`] into the page, runs the
//! queries there and sends back a [`ProbeOutput`] of plain booleans. The
//! matching rules live here as a pure function over a [`DomSnapshot`] so they
//! can be tested without a browser.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Matches one element by tag, id and/or class. Unset parts match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

impl NodeMatcher {
    pub fn tag_with_id(tag: &str, id: &str) -> Self {
        Self {
            tag: Some(tag.into()),
            id: Some(id.into()),
            class: None,
        }
    }

    pub fn class(class: &str) -> Self {
        Self {
            class: Some(class.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, element: &ElementInfo) -> bool {
        if self.tag.is_none() && self.id.is_none() && self.class.is_none() {
            return false;
        }
        self.tag
            .as_deref()
            .map_or(true, |tag| element.tag.eq_ignore_ascii_case(tag))
            && self
                .id
                .as_deref()
                .map_or(true, |id| element.id.as_deref() == Some(id))
            && self
                .class
                .as_deref()
                .map_or(true, |class| element.classes.iter().any(|c| c == class))
    }
}

/// What to look for in the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeSpec {
    /// Elements only the target application renders.
    pub app_markers: Vec<NodeMatcher>,
    /// `<body>` classes set by the point-of-sale client.
    pub pos_body_classes: Vec<String>,
    /// Substrings of script URLs loaded only by the point-of-sale client.
    pub pos_script_fragments: Vec<String>,
    /// Elements only the point-of-sale client renders.
    pub pos_nodes: Vec<NodeMatcher>,
}

impl Default for ProbeSpec {
    fn default() -> Self {
        Self {
            app_markers: vec![NodeMatcher::tag_with_id("script", "web.layout.odooscript")],
            pos_body_classes: vec!["pos".into()],
            pos_script_fragments: vec!["point_of_sale".into()],
            pos_nodes: vec![NodeMatcher::class("pos"), NodeMatcher::class("pos-content")],
        }
    }
}

impl ProbeSpec {
    /// Reference evaluation of this spec against a captured page.
    pub fn evaluate(&self, dom: &DomSnapshot) -> ProbeOutput {
        ProbeOutput {
            has_app_marker: self
                .app_markers
                .iter()
                .any(|m| dom.elements.iter().any(|e| m.matches(e))),
            has_pos_body_class: self
                .pos_body_classes
                .iter()
                .any(|c| dom.body_classes.iter().any(|b| b == c)),
            has_pos_script: dom
                .script_sources()
                .any(|src| self.pos_script_fragments.iter().any(|f| src.contains(f.as_str()))),
            has_pos_node: self
                .pos_nodes
                .iter()
                .any(|m| dom.elements.iter().any(|e| m.matches(e))),
        }
    }
}

/// Result of running a probe in the page. Booleans only: no page objects
/// ever cross the host boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeOutput {
    pub has_app_marker: bool,
    pub has_pos_body_class: bool,
    pub has_pos_script: bool,
    pub has_pos_node: bool,
}

impl ProbeOutput {
    pub fn is_pos(&self) -> bool {
        self.has_pos_body_class || self.has_pos_script || self.has_pos_node
    }
}

/// Flattened view of a page, enough to evaluate a [`ProbeSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomSnapshot {
    pub body_classes: Vec<String>,
    pub elements: Vec<ElementInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementInfo {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub src: Option<String>,
}

impl ElementInfo {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_src(mut self, src: &str) -> Self {
        self.src = Some(src.into());
        self
    }
}

impl DomSnapshot {
    fn script_sources(&self) -> impl Iterator<Item = &str> {
        self.elements
            .iter()
            .filter(|e| e.tag.eq_ignore_ascii_case("script"))
            .filter_map(|e| e.src.as_deref())
    }
}

/// Capability to inspect the current page. Supplied by the host.
#[async_trait]
pub trait DomProbe: Send + Sync {
    async fn probe(&self, spec: &ProbeSpec) -> Result<ProbeOutput, HostError>;
}

/// A captured page answers probes directly.
#[async_trait]
impl DomProbe for DomSnapshot {
    async fn probe(&self, spec: &ProbeSpec) -> Result<ProbeOutput, HostError> {
        Ok(spec.evaluate(self))
    }
}

/// Probe for contexts where the page cannot be scripted at all.
pub struct NoProbe;

#[async_trait]
impl DomProbe for NoProbe {
    async fn probe(&self, _spec: &ProbeSpec) -> Result<ProbeOutput, HostError> {
        Err(HostError::Unavailable)
    }
}
