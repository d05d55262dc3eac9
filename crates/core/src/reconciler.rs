// crates/core/src/reconciler.rs
//! Navigation reconciler.
//!
//! On every address change the page's debug state is re-derived from three
//! inputs: the marker in the new address, the previous record and a fresh
//! classification. The decision itself is [`resolve`], a pure function; the
//! [`Reconciler`] wraps it with locking, classification and host effects.

use std::sync::Arc;

use dashmap::DashMap;
use odoo_inspector_types::{ContextVerdict, DebugMode, PageDebugRecord, PageSessionId};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::classifier::ContextClassifier;
use crate::codec::{parse_debug_fragment, write_debug_fragment};
use crate::conventions::AutoEnablePolicy;
use crate::host::SessionProbe;
use crate::service::DebugStateService;

/// Which branch of the state machine produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The address carries a marker; it wins over history.
    ExplicitMarker,
    /// Page is no longer recognised, debug cannot stay on.
    TargetLost,
    /// Address changed while debug was on; re-evaluated against the policy.
    Recomputed,
    CarriedForward,
    AutoEnabled,
    /// First sight of a page that should stay at default-off.
    NoRecord,
}

/// Everything [`resolve`] looks at.
#[derive(Debug, Clone, Copy)]
pub struct NavigationInput<'a> {
    pub prior: Option<PageDebugRecord>,
    pub address: &'a str,
    pub address_changed: bool,
    /// Only consulted when the address has no marker. `None` there means the
    /// page was not classified and is treated as not a target.
    pub verdict: Option<ContextVerdict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Record to store, `None` when nothing should be written.
    pub record: Option<PageDebugRecord>,
    /// Address the page should be sent to so it agrees with `record`.
    pub corrective_address: Option<String>,
    pub decision: Decision,
}

/// Decide the new record for one navigation.
pub fn resolve(input: NavigationInput<'_>, policy: &AutoEnablePolicy) -> Resolution {
    if let Some(fragment) = parse_debug_fragment(input.address) {
        // An explicit marker is never rewritten against itself.
        return Resolution {
            record: Some(fragment.into()),
            corrective_address: None,
            decision: Decision::ExplicitMarker,
        };
    }

    let verdict = input.verdict.unwrap_or(ContextVerdict::NOT_TARGET);
    let (record, decision) = match input.prior {
        Some(_) if !verdict.is_target => (Some(PageDebugRecord::DISABLED), Decision::TargetLost),
        Some(prior) if input.address_changed && prior.is_enabled() => (
            Some(PageDebugRecord::new(policy.allows(&verdict), prior.mode())),
            Decision::Recomputed,
        ),
        Some(prior) => (Some(prior), Decision::CarriedForward),
        None if policy.allows(&verdict) => (
            Some(PageDebugRecord::enabled(DebugMode::Normal)),
            Decision::AutoEnabled,
        ),
        None => (None, Decision::NoRecord),
    };

    let corrective_address = record.and_then(|r| {
        let rewritten = write_debug_fragment(input.address, r.is_enabled(), r.mode());
        (rewritten != input.address).then_some(rewritten)
    });

    Resolution {
        record,
        corrective_address,
        decision,
    }
}

/// Host notification that a page's address changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    pub page_session_id: PageSessionId,
    pub address: String,
    /// `false` for in-progress loads.
    #[serde(default = "default_complete")]
    pub complete: bool,
}

fn default_complete() -> bool {
    true
}

pub struct Reconciler {
    service: Arc<DebugStateService>,
    classifier: ContextClassifier,
    policy: AutoEnablePolicy,
    last_addresses: DashMap<PageSessionId, String>,
}

impl Reconciler {
    pub fn new(
        service: Arc<DebugStateService>,
        classifier: ContextClassifier,
        policy: AutoEnablePolicy,
    ) -> Self {
        Self {
            service,
            classifier,
            policy,
            last_addresses: DashMap::new(),
        }
    }

    /// Run one reconciliation pass. Returns `None` when the event was
    /// ignored (non-web page, or a partial load that did not move).
    ///
    /// Holds the page lock for the whole pass, corrective navigation
    /// included, so passes for the same page never interleave.
    pub async fn on_address_changed(&self, event: &NavigationEvent) -> Option<Resolution> {
        let id = event.page_session_id;
        if !is_web_address(&event.address) {
            tracing::debug!(page_session_id = %id, address = %event.address, "ignoring non-web address");
            return None;
        }

        let guard = self.service.lock(id).await;

        let address_changed = self
            .last_addresses
            .get(&id)
            .map_or(true, |last| *last != event.address);
        if !event.complete && !address_changed {
            return None;
        }
        self.last_addresses.insert(id, event.address.clone());

        let prior = self.service.store().lookup(id).await;
        let verdict = if parse_debug_fragment(&event.address).is_none() {
            let probe = SessionProbe::new(self.service.host().as_ref(), id);
            let classification = self.classifier.classify(&event.address, &probe).await;
            Some(classification.verdict)
        } else {
            None
        };

        let resolution = resolve(
            NavigationInput {
                prior,
                address: &event.address,
                address_changed,
                verdict,
            },
            &self.policy,
        );
        tracing::debug!(
            page_session_id = %id,
            decision = ?resolution.decision,
            corrective = resolution.corrective_address.is_some(),
            "navigation resolved"
        );

        if let Some(record) = resolution.record {
            self.service.apply_locked(&guard, record).await;
        }
        if let Some(corrected) = &resolution.corrective_address {
            self.last_addresses.insert(id, corrected.clone());
            if let Err(e) = self.service.host().navigate(id, corrected).await {
                tracing::warn!(page_session_id = %id, error = %e, "corrective navigation failed");
            }
        }

        Some(resolution)
    }

    pub async fn on_session_closed(&self, id: PageSessionId) {
        self.last_addresses.remove(&id);
        self.service.end_session(id).await;
    }

    /// Forget every page. Used on shutdown together with the store.
    pub fn reset(&self) {
        self.last_addresses.clear();
    }
}

fn is_web_address(address: &str) -> bool {
    Url::parse(address).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
