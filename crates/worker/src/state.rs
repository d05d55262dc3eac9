// crates/worker/src/state.rs
use std::sync::Arc;

use odoo_inspector_core::{ContextClassifier, DebugStateService, PageHost, ProtocolHandler, Reconciler};

use crate::bridge::BridgeHost;
use crate::config::WorkerConfig;

/// Shared worker state.
#[derive(Clone)]
pub struct WorkerState {
    /// Connection to the in-browser shim.
    pub bridge: Arc<BridgeHost>,
    pub service: Arc<DebugStateService>,
    pub protocol: ProtocolHandler,
    pub reconciler: Arc<Reconciler>,
}

impl WorkerState {
    /// Host commands go through the WebSocket bridge.
    pub fn new(config: &WorkerConfig) -> Self {
        let bridge = Arc::new(BridgeHost::new(config.host_bridge.clone()));
        Self::assemble(config, bridge.clone(), bridge)
    }

    /// Host commands go to `host` instead of the bridge. The bridge endpoint
    /// still accepts connections but nothing is sent through it.
    pub fn with_host(config: &WorkerConfig, host: Arc<dyn PageHost>) -> Self {
        let bridge = Arc::new(BridgeHost::new(config.host_bridge.clone()));
        Self::assemble(config, bridge, host)
    }

    fn assemble(config: &WorkerConfig, bridge: Arc<BridgeHost>, host: Arc<dyn PageHost>) -> Self {
        let service = Arc::new(DebugStateService::new(host));
        let reconciler = Arc::new(Reconciler::new(
            service.clone(),
            ContextClassifier::new(config.conventions.clone()),
            config.policy,
        ));
        Self {
            bridge,
            protocol: ProtocolHandler::new(service.clone()),
            service,
            reconciler,
        }
    }

    /// Process is going away: drop every page's state.
    pub async fn shutdown(&self) {
        self.reconciler.reset();
        self.service.shutdown().await;
    }
}
