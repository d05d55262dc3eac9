// crates/core/src/popup.rs
//! Controller behind the popup. It never touches the store directly: every
//! read and write is a protocol round trip, so what it shows may be stale by
//! the time the user clicks. The protocol is idempotent, which makes that
//! harmless.

use std::sync::Arc;

use odoo_inspector_types::{ContextVerdict, DebugMode, PageDebugRecord, PageSessionId};
use serde::Serialize;

use crate::classifier::ContextClassifier;
use crate::codec::{parse_debug_fragment, write_debug_fragment};
use crate::error::PopupError;
use crate::host::{PageHost, SessionProbe};
use crate::protocol::ProtocolClient;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ToggleState {
    /// Control can be used.
    pub available: bool,
    pub checked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    NotTargetPage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupView {
    pub verdict: ContextVerdict,
    pub debug: ToggleState,
    pub mode: DebugMode,
    pub inspector: ToggleState,
    pub notice: Option<Notice>,
}

pub struct PopupController {
    page_session_id: PageSessionId,
    address: String,
    host: Arc<dyn PageHost>,
    client: Arc<dyn ProtocolClient>,
    classifier: ContextClassifier,
}

impl PopupController {
    pub fn new(
        page_session_id: PageSessionId,
        address: impl Into<String>,
        host: Arc<dyn PageHost>,
        client: Arc<dyn ProtocolClient>,
        classifier: ContextClassifier,
    ) -> Self {
        Self {
            page_session_id,
            address: address.into(),
            host,
            client,
            classifier,
        }
    }

    /// Address the controller believes the page is on.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn verdict(&self) -> ContextVerdict {
        let probe = SessionProbe::new(self.host.as_ref(), self.page_session_id);
        self.classifier.classify(&self.address, &probe).await.verdict
    }

    /// Marker in the address first, the background's record otherwise.
    async fn debug_state(&self) -> Result<PageDebugRecord, PopupError> {
        match parse_debug_fragment(&self.address) {
            Some(fragment) => Ok(fragment.into()),
            None => Ok(self.client.get_state(self.page_session_id).await?),
        }
    }

    /// Everything the popup renders when it opens.
    pub async fn view(&self) -> PopupView {
        let verdict = self.verdict().await;
        if !verdict.is_target {
            return PopupView {
                verdict,
                debug: ToggleState::default(),
                mode: DebugMode::Normal,
                inspector: ToggleState::default(),
                notice: Some(Notice::NotTargetPage),
            };
        }

        let record = self.debug_state().await.unwrap_or_else(|e| {
            tracing::warn!(page_session_id = %self.page_session_id, error = %e, "could not read debug state");
            PageDebugRecord::DISABLED
        });
        let inspector_on = if record.is_enabled() {
            self.host
                .inspector_state(self.page_session_id)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(page_session_id = %self.page_session_id, error = %e, "could not read inspector state");
                    false
                })
        } else {
            false
        };

        PopupView {
            verdict,
            debug: ToggleState {
                available: true,
                checked: record.is_enabled(),
            },
            mode: record.mode(),
            inspector: ToggleState {
                available: record.is_enabled(),
                checked: inspector_on,
            },
            notice: None,
        }
    }

    /// Switch debug on or off: re-check the page, write the new state, then
    /// move the page to the matching address.
    pub async fn toggle_debug(&mut self, on: bool, mode: DebugMode) -> Result<PageDebugRecord, PopupError> {
        if !self.verdict().await.is_target {
            return Err(PopupError::NotTarget);
        }

        let record = PageDebugRecord::new(on, mode);
        let target = write_debug_fragment(&self.address, record.is_enabled(), record.mode());
        self.client
            .set_state(self.page_session_id, record.is_enabled(), record.mode())
            .await?;

        if target != self.address {
            self.host.navigate(self.page_session_id, &target).await?;
            self.address = target;
        }
        Ok(record)
    }

    pub async fn toggle_inspector(&self, on: bool) -> Result<(), PopupError> {
        if on && !self.debug_state().await?.is_enabled() {
            return Err(PopupError::InspectorRequiresDebug);
        }
        self.host.set_inspector(self.page_session_id, on).await?;
        Ok(())
    }
}
