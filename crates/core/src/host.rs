// crates/core/src/host.rs
//! Host capabilities: what the browser lets the background process do to a
//! page.
//!
//! Transports implement [`HostTransport`] (one command in, one JSON reply
//! out) and get [`PageHost`] for free.

use async_trait::async_trait;
use odoo_inspector_types::PageSessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HostError;
use crate::probe::{DomProbe, ProbeOutput, ProbeSpec};

/// A single instruction for the host, as sent over the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum HostCommand {
    Probe { page_session_id: PageSessionId, spec: ProbeSpec },
    Navigate { page_session_id: PageSessionId, address: String },
    SetIcon { page_session_id: PageSessionId, enabled: bool },
    ShowTooltips { page_session_id: PageSessionId },
    BlockTooltips { page_session_id: PageSessionId },
    SetInspector { page_session_id: PageSessionId, enabled: bool },
    InspectorState { page_session_id: PageSessionId },
}

impl HostCommand {
    pub fn page_session_id(&self) -> PageSessionId {
        match self {
            Self::Probe { page_session_id, .. }
            | Self::Navigate { page_session_id, .. }
            | Self::SetIcon { page_session_id, .. }
            | Self::ShowTooltips { page_session_id }
            | Self::BlockTooltips { page_session_id }
            | Self::SetInspector { page_session_id, .. }
            | Self::InspectorState { page_session_id } => *page_session_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Probe { .. } => "probe",
            Self::Navigate { .. } => "navigate",
            Self::SetIcon { .. } => "set_icon",
            Self::ShowTooltips { .. } => "show_tooltips",
            Self::BlockTooltips { .. } => "block_tooltips",
            Self::SetInspector { .. } => "set_inspector",
            Self::InspectorState { .. } => "inspector_state",
        }
    }
}

/// Raw command channel to the host.
#[async_trait]
pub trait HostTransport: Send + Sync {
    async fn execute(&self, command: HostCommand) -> Result<Value, HostError>;
}

/// Typed host capabilities used by the core.
#[async_trait]
pub trait PageHost: Send + Sync {
    async fn run_probe(&self, id: PageSessionId, spec: &ProbeSpec) -> Result<ProbeOutput, HostError>;
    async fn navigate(&self, id: PageSessionId, address: &str) -> Result<(), HostError>;
    async fn set_icon(&self, id: PageSessionId, enabled: bool) -> Result<(), HostError>;
    async fn show_tooltips(&self, id: PageSessionId) -> Result<(), HostError>;
    async fn block_tooltips(&self, id: PageSessionId) -> Result<(), HostError>;
    async fn set_inspector(&self, id: PageSessionId, enabled: bool) -> Result<(), HostError>;
    async fn inspector_state(&self, id: PageSessionId) -> Result<bool, HostError>;
}

#[async_trait]
impl<T> PageHost for T
where
    T: HostTransport + ?Sized,
{
    async fn run_probe(&self, id: PageSessionId, spec: &ProbeSpec) -> Result<ProbeOutput, HostError> {
        let reply = self
            .execute(HostCommand::Probe {
                page_session_id: id,
                spec: spec.clone(),
            })
            .await?;
        serde_json::from_value(reply).map_err(|e| HostError::InvalidReply(e.to_string()))
    }

    async fn navigate(&self, id: PageSessionId, address: &str) -> Result<(), HostError> {
        self.execute(HostCommand::Navigate {
            page_session_id: id,
            address: address.to_string(),
        })
        .await
        .map(drop)
    }

    async fn set_icon(&self, id: PageSessionId, enabled: bool) -> Result<(), HostError> {
        self.execute(HostCommand::SetIcon {
            page_session_id: id,
            enabled,
        })
        .await
        .map(drop)
    }

    async fn show_tooltips(&self, id: PageSessionId) -> Result<(), HostError> {
        self.execute(HostCommand::ShowTooltips { page_session_id: id })
            .await
            .map(drop)
    }

    async fn block_tooltips(&self, id: PageSessionId) -> Result<(), HostError> {
        self.execute(HostCommand::BlockTooltips { page_session_id: id })
            .await
            .map(drop)
    }

    async fn set_inspector(&self, id: PageSessionId, enabled: bool) -> Result<(), HostError> {
        self.execute(HostCommand::SetInspector {
            page_session_id: id,
            enabled,
        })
        .await
        .map(drop)
    }

    async fn inspector_state(&self, id: PageSessionId) -> Result<bool, HostError> {
        let reply = self
            .execute(HostCommand::InspectorState { page_session_id: id })
            .await?;
        reply
            .as_bool()
            .ok_or_else(|| HostError::InvalidReply(format!("expected boolean, got {reply}")))
    }
}

/// Binds a host to one page so the classifier can probe it.
pub struct SessionProbe<'a> {
    host: &'a dyn PageHost,
    id: PageSessionId,
}

impl<'a> SessionProbe<'a> {
    pub fn new(host: &'a dyn PageHost, id: PageSessionId) -> Self {
        Self { host, id }
    }
}

#[async_trait]
impl DomProbe for SessionProbe<'_> {
    async fn probe(&self, spec: &ProbeSpec) -> Result<ProbeOutput, HostError> {
        self.host.run_probe(self.id, spec).await
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! In-memory host that records every command, for tests.

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;
    use crate::probe::DomSnapshot;

    #[derive(Default)]
    pub struct RecordingHost {
        log: Mutex<Vec<HostCommand>>,
        pages: Mutex<HashMap<PageSessionId, DomSnapshot>>,
        inspectors: Mutex<HashSet<PageSessionId>>,
        failing: Mutex<HashSet<&'static str>>,
    }

    impl RecordingHost {
        pub fn new() -> Self {
            Self::default()
        }

        /// Content the probe will see for `id`. Unknown pages probe as empty.
        pub fn with_page(self, id: PageSessionId, dom: DomSnapshot) -> Self {
            lock(&self.pages).insert(id, dom);
            self
        }

        /// Make every command with this name fail as if the page were restricted.
        pub fn fail(&self, command: &'static str) {
            lock(&self.failing).insert(command);
        }

        pub fn set_inspector_active(&self, id: PageSessionId, active: bool) {
            let mut inspectors = lock(&self.inspectors);
            if active {
                inspectors.insert(id);
            } else {
                inspectors.remove(&id);
            }
        }

        pub fn commands(&self) -> Vec<HostCommand> {
            lock(&self.log).clone()
        }

        pub fn command_names(&self) -> Vec<&'static str> {
            lock(&self.log).iter().map(HostCommand::name).collect()
        }

        pub fn navigations(&self) -> Vec<String> {
            lock(&self.log)
                .iter()
                .filter_map(|c| match c {
                    HostCommand::Navigate { address, .. } => Some(address.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn clear_log(&self) {
            lock(&self.log).clear();
        }
    }

    fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        m.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[async_trait]
    impl HostTransport for RecordingHost {
        async fn execute(&self, command: HostCommand) -> Result<Value, HostError> {
            lock(&self.log).push(command.clone());
            let id = command.page_session_id();
            if lock(&self.failing).contains(&command.name()) {
                return Err(HostError::Restricted {
                    page_session_id: id,
                    reason: "scripting denied".into(),
                });
            }
            match command {
                HostCommand::Probe { spec, .. } => {
                    let dom = lock(&self.pages).get(&id).cloned().unwrap_or_default();
                    serde_json::to_value(spec.evaluate(&dom))
                        .map_err(|e| HostError::InvalidReply(e.to_string()))
                }
                HostCommand::SetInspector { enabled, .. } => {
                    self.set_inspector_active(id, enabled);
                    Ok(Value::Null)
                }
                HostCommand::InspectorState { .. } => {
                    Ok(Value::Bool(lock(&self.inspectors).contains(&id)))
                }
                _ => Ok(Value::Null),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingHost;
    use super::*;
    use crate::probe::{DomSnapshot, ElementInfo};
    use serde_json::json;

    const PAGE: PageSessionId = PageSessionId(5);

    #[test]
    fn test_command_wire_shape() {
        let cmd = HostCommand::SetIcon {
            page_session_id: PAGE,
            enabled: true,
        };
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({"command": "set_icon", "pageSessionId": 5, "enabled": true})
        );
        let back: HostCommand =
            serde_json::from_value(json!({"command": "block_tooltips", "pageSessionId": 5})).unwrap();
        assert_eq!(back, HostCommand::BlockTooltips { page_session_id: PAGE });
    }

    #[tokio::test]
    async fn test_typed_calls_go_through_transport() {
        let page = DomSnapshot {
            elements: vec![ElementInfo::new("script").with_id("web.layout.odooscript")],
            ..DomSnapshot::default()
        };
        let host = RecordingHost::new().with_page(PAGE, page);

        let out = host.run_probe(PAGE, &ProbeSpec::default()).await.unwrap();
        assert!(out.has_app_marker);

        host.set_inspector(PAGE, true).await.unwrap();
        assert!(host.inspector_state(PAGE).await.unwrap());
        host.navigate(PAGE, "https://x.test/web?debug=1").await.unwrap();

        assert_eq!(
            host.command_names(),
            vec!["probe", "set_inspector", "inspector_state", "navigate"]
        );
        assert_eq!(host.navigations(), vec!["https://x.test/web?debug=1".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_command() {
        let host = RecordingHost::new();
        host.fail("probe");
        let probe = SessionProbe::new(&host, PAGE);
        let err = probe.probe(&ProbeSpec::default()).await.unwrap_err();
        assert!(matches!(err, HostError::Restricted { .. }));
    }

    struct ScriptedTransport(Value);

    #[async_trait]
    impl HostTransport for ScriptedTransport {
        async fn execute(&self, _command: HostCommand) -> Result<Value, HostError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_bad_replies_are_reported() {
        let host = ScriptedTransport(json!("yes"));
        assert!(matches!(
            host.inspector_state(PAGE).await,
            Err(HostError::InvalidReply(_))
        ));
        assert!(matches!(
            host.run_probe(PAGE, &ProbeSpec::default()).await,
            Err(HostError::InvalidReply(_))
        ));
    }
}
