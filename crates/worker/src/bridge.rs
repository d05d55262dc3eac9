// crates/worker/src/bridge.rs
//! WebSocket bridge to the in-browser shim.
//!
//! The shim is the only thing that can touch real pages. It connects to
//! `/bridge`; the worker pushes [`HostCommand`]s tagged with a correlation id
//! and the shim answers each with a reply frame carrying the same id.
//!
//! ```text
//! worker -> shim  {"id":7,"command":"probe","pageSessionId":3,"spec":{...}}
//! shim -> worker  {"id":7,"result":{"hasAppMarker":true,...}}
//! shim -> worker  {"id":8,"error":"cannot access chrome:// URL","restricted":true}
//! ```
//!
//! The first frame must authenticate with the configured shared token:
//!
//! ```text
//! shim -> worker  {"type":"auth","token":"..."}
//! worker -> shim  {"type":"auth_ok"}
//! ```
//!
//! Sockets that fail the handshake are closed without touching the current
//! shim. Among authenticated connections the most recent one wins. With no
//! shim connected every command fails with [`HostError::Unavailable`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use odoo_inspector_core::{HostCommand, HostError, HostTransport};
use odoo_inspector_types::PageSessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::state::WorkerState;

#[derive(Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a HostCommand,
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
    /// The page refused scripting (restricted URL, missing permission).
    #[serde(default)]
    restricted: bool,
}

impl BridgeReply {
    fn into_result(self, page_session_id: PageSessionId) -> Result<Value, HostError> {
        match self.error {
            Some(reason) if self.restricted => Err(HostError::Restricted {
                page_session_id,
                reason,
            }),
            Some(reason) => Err(HostError::Command(reason)),
            None => Ok(self.result),
        }
    }
}

#[derive(Deserialize)]
struct AuthFrame {
    #[serde(rename = "type")]
    frame_type: String,
    token: String,
}

struct ShimConnection {
    generation: u64,
    tx: mpsc::UnboundedSender<String>,
}

pub struct BridgeHost {
    next_id: AtomicU64,
    next_generation: AtomicU64,
    pending: DashMap<u64, oneshot::Sender<BridgeReply>>,
    shim: Mutex<Option<ShimConnection>>,
    config: BridgeConfig,
}

impl BridgeHost {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            next_generation: AtomicU64::new(1),
            pending: DashMap::new(),
            shim: Mutex::new(None),
            config,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shim_lock().is_some()
    }

    fn shim_lock(&self) -> std::sync::MutexGuard<'_, Option<ShimConnection>> {
        self.shim.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new shim connection, replacing any previous one. Returns
    /// the generation to hand back to [`detach`](Self::detach) and the
    /// stream of outgoing frames.
    pub fn attach(&self) -> (u64, mpsc::UnboundedReceiver<String>) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let replaced = self.shim_lock().replace(ShimConnection { generation, tx });
        if replaced.is_some() {
            info!(generation, "host shim replaced an older connection");
        }
        (generation, rx)
    }

    /// Drop the connection if it is still the current one. Commands waiting
    /// on it fail as unavailable.
    pub fn detach(&self, generation: u64) {
        let mut shim = self.shim_lock();
        if shim.as_ref().is_some_and(|c| c.generation == generation) {
            *shim = None;
            drop(shim);
            self.pending.clear();
        }
    }

    /// Route one frame from the shim to the command waiting for it.
    pub fn deliver(&self, frame: &str) {
        let reply: BridgeReply = match serde_json::from_str(frame) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "unreadable frame from host shim");
                return;
            }
        };
        match self.pending.remove(&reply.id) {
            Some((_, waiter)) => {
                let _ = waiter.send(reply);
            }
            None => debug!(id = reply.id, "reply for unknown or expired command"),
        }
    }

    /// Check a shim's first frame against the configured token.
    pub fn verify_auth(&self, frame: &str) -> Result<(), &'static str> {
        let Ok(auth) = serde_json::from_str::<AuthFrame>(frame) else {
            return Err("invalid auth format");
        };
        if auth.frame_type != "auth" {
            return Err("first message must be auth");
        }
        match self.config.token.as_deref() {
            Some(expected) if tokens_match(expected, &auth.token) => Ok(()),
            _ => Err("auth failed"),
        }
    }

    fn timeout_for(&self, command: &HostCommand) -> Duration {
        match command {
            HostCommand::Probe { .. } => self.config.probe_timeout(),
            _ => self.config.command_timeout(),
        }
    }
}

fn tokens_match(expected: &str, given: &str) -> bool {
    expected.len() == given.len()
        && expected
            .bytes()
            .zip(given.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[async_trait]
impl HostTransport for BridgeHost {
    async fn execute(&self, command: HostCommand) -> Result<Value, HostError> {
        let tx = self
            .shim_lock()
            .as_ref()
            .map(|c| c.tx.clone())
            .ok_or(HostError::Unavailable)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_string(&BridgeRequest { id, command: &command })
            .map_err(|e| HostError::Command(e.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(id, reply_tx);
        if tx.send(frame).is_err() {
            self.pending.remove(&id);
            return Err(HostError::Unavailable);
        }

        let limit = self.timeout_for(&command);
        match tokio::time::timeout(limit, reply_rx).await {
            Ok(Ok(reply)) => reply.into_result(command.page_session_id()),
            // Waiter dropped: the shim went away mid-command.
            Ok(Err(_)) => Err(HostError::Unavailable),
            Err(_) => {
                self.pending.remove(&id);
                Err(HostError::Timeout(limit.as_millis() as u64))
            }
        }
    }
}

pub async fn bridge_handler(
    ws: WebSocketUpgrade,
    State(state): State<WorkerState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WorkerState) {
    let bridge = state.bridge.clone();
    let (mut sink, mut stream) = socket.split();

    // First message must be auth
    let first = tokio::time::timeout(bridge.config.command_timeout(), stream.next()).await;
    let Ok(Some(Ok(Message::Text(first)))) = first else {
        debug!("host shim closed or stalled before auth");
        return;
    };
    if let Err(reason) = bridge.verify_auth(first.as_str()) {
        warn!(reason, "host shim refused");
        let error = serde_json::json!({ "error": reason }).to_string();
        let _ = sink.send(Message::Text(error.into())).await;
        return;
    }
    let _ = sink
        .send(Message::Text(r#"{"type":"auth_ok"}"#.into()))
        .await;

    let (generation, mut rx) = bridge.attach();
    info!(generation, "host shim connected");

    let forward_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => bridge.deliver(text.as_str()),
            Message::Close(_) => break,
            _ => {}
        }
    }

    bridge.detach(generation);
    forward_task.abort();
    info!(generation, "host shim disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use odoo_inspector_core::{PageHost, ProbeSpec};
    use serde_json::json;

    const PAGE: PageSessionId = PageSessionId(3);

    fn bridge(timeout_ms: u64) -> BridgeHost {
        BridgeHost::new(BridgeConfig {
            probe_timeout_ms: timeout_ms,
            command_timeout_ms: timeout_ms,
            token: Some("s3cret".into()),
        })
    }

    #[test]
    fn test_verify_auth() {
        let bridge = bridge(100);
        assert_eq!(bridge.verify_auth(r#"{"type":"auth","token":"s3cret"}"#), Ok(()));
        assert_eq!(
            bridge.verify_auth(r#"{"type":"auth","token":"s3crex"}"#),
            Err("auth failed")
        );
        assert_eq!(
            bridge.verify_auth(r#"{"type":"auth","token":"s3cret-longer"}"#),
            Err("auth failed")
        );
        assert_eq!(
            bridge.verify_auth(r#"{"type":"hello","token":"s3cret"}"#),
            Err("first message must be auth")
        );
        assert_eq!(
            bridge.verify_auth(r#"{"id":1,"result":null}"#),
            Err("invalid auth format")
        );
    }

    #[test]
    fn test_no_configured_token_refuses_everyone() {
        let bridge = BridgeHost::new(BridgeConfig::default());
        assert_eq!(
            bridge.verify_auth(r#"{"type":"auth","token":""}"#),
            Err("auth failed")
        );
    }

    #[tokio::test]
    async fn test_unavailable_without_shim() {
        let bridge = bridge(100);
        assert!(!bridge.is_connected());
        assert_eq!(bridge.set_icon(PAGE, true).await, Err(HostError::Unavailable));
    }

    #[tokio::test]
    async fn test_command_round_trip() {
        let bridge = std::sync::Arc::new(bridge(1000));
        let (_, mut rx) = bridge.attach();

        let shim = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
                assert_eq!(frame["command"], "inspector_state");
                assert_eq!(frame["pageSessionId"], 3);
                let id = frame["id"].as_u64().unwrap();
                bridge.deliver(&json!({"id": id, "result": true}).to_string());
            })
        };

        assert!(bridge.inspector_state(PAGE).await.unwrap());
        shim.await.unwrap();
    }

    #[tokio::test]
    async fn test_restricted_and_failed_replies() {
        let bridge = std::sync::Arc::new(bridge(1000));
        let (_, mut rx) = bridge.attach();

        let shim = {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                for restricted in [true, false] {
                    let frame: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
                    let id = frame["id"].as_u64().unwrap();
                    bridge.deliver(
                        &json!({"id": id, "error": "denied", "restricted": restricted}).to_string(),
                    );
                }
            })
        };

        assert!(matches!(
            bridge.run_probe(PAGE, &ProbeSpec::default()).await,
            Err(HostError::Restricted { .. })
        ));
        assert_eq!(
            bridge.navigate(PAGE, "https://x.test/").await,
            Err(HostError::Command("denied".into()))
        );
        shim.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_shim_times_out() {
        let bridge = bridge(250);
        let (_, _rx) = bridge.attach();
        assert_eq!(bridge.block_tooltips(PAGE).await, Err(HostError::Timeout(250)));
        assert!(bridge.pending.is_empty());
    }

    #[tokio::test]
    async fn test_detach_fails_waiters_and_ignores_stale_generation() {
        let bridge = std::sync::Arc::new(bridge(5000));
        let (old, _old_rx) = bridge.attach();
        let (current, mut rx) = bridge.attach();

        bridge.detach(old);
        assert!(bridge.is_connected());

        let waiter = {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.show_tooltips(PAGE).await })
        };
        rx.recv().await.unwrap();
        bridge.detach(current);

        assert_eq!(waiter.await.unwrap(), Err(HostError::Unavailable));
        assert!(!bridge.is_connected());
    }
}
