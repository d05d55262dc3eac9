// crates/core/src/service.rs
//! SET/GET over the store, with the host side effects a write implies.
//!
//! All writes for one page go through that page's lock, so a navigation pass
//! and a popup toggle for the same page never interleave. Different pages
//! proceed concurrently.

use std::sync::Arc;

use dashmap::DashMap;
use odoo_inspector_types::{DebugMode, PageDebugRecord, PageSessionId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::host::PageHost;
use crate::store::{DebugStateStore, Upsert};

/// Proof that the holder owns a page's lock.
pub struct SessionGuard {
    id: PageSessionId,
    _guard: OwnedMutexGuard<()>,
}

impl SessionGuard {
    pub fn page_session_id(&self) -> PageSessionId {
        self.id
    }
}

pub struct DebugStateService {
    store: DebugStateStore,
    host: Arc<dyn PageHost>,
    locks: DashMap<PageSessionId, Arc<Mutex<()>>>,
}

impl DebugStateService {
    pub fn new(host: Arc<dyn PageHost>) -> Self {
        Self {
            store: DebugStateStore::new(),
            host,
            locks: DashMap::new(),
        }
    }

    pub fn host(&self) -> &Arc<dyn PageHost> {
        &self.host
    }

    pub fn store(&self) -> &DebugStateStore {
        &self.store
    }

    /// Wait for exclusive access to one page's state.
    pub async fn lock(&self, id: PageSessionId) -> SessionGuard {
        let mutex = self.locks.entry(id).or_default().clone();
        SessionGuard {
            id,
            _guard: mutex.lock_owned().await,
        }
    }

    /// `SET`: idempotent, `mode` is forced to normal when disabling.
    pub async fn set(&self, id: PageSessionId, enabled: bool, mode: DebugMode) -> PageDebugRecord {
        let guard = self.lock(id).await;
        let record = PageDebugRecord::new(enabled, mode);
        self.apply_locked(&guard, record).await;
        record
    }

    /// `GET`: never fails, unknown pages read as disabled.
    pub async fn get(&self, id: PageSessionId) -> PageDebugRecord {
        self.store.get(id).await
    }

    /// Push the side effects of `record` to the host, then store it. The
    /// inspector is switched off before anything else when disabling, and
    /// nothing is stored until every effect has been attempted.
    pub async fn apply_locked(&self, guard: &SessionGuard, record: PageDebugRecord) {
        let id = guard.page_session_id();

        if !record.is_enabled() {
            if let Err(e) = self.host.set_inspector(id, false).await {
                tracing::warn!(page_session_id = %id, error = %e, "inspector deactivation failed");
            }
        }
        if let Err(e) = self.host.set_icon(id, record.is_enabled()).await {
            tracing::warn!(page_session_id = %id, error = %e, "icon refresh failed");
        }
        let tooltips = if record.is_enabled() {
            self.host.show_tooltips(id).await
        } else {
            self.host.block_tooltips(id).await
        };
        if let Err(e) = tooltips {
            tracing::warn!(page_session_id = %id, error = %e, "tooltip update failed");
        }

        match self.store.upsert(id, record).await {
            Upsert::Updated { previous } if previous == record => {}
            _ => tracing::debug!(
                page_session_id = %id,
                enabled = record.is_enabled(),
                mode = record.mode().as_str(),
                "debug state changed"
            ),
        }
    }

    /// Page went away: forget everything about it.
    ///
    /// The page's lock entry is dropped only when nobody else holds or waits
    /// on it, so a late writer still serializes with later callers.
    pub async fn end_session(&self, id: PageSessionId) {
        let guard = self.lock(id).await;
        self.store.purge(id).await;
        drop(guard);
        self.locks.remove_if(&id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Process is going down: the store is never persisted.
    pub async fn shutdown(&self) {
        let count = self.store.len().await;
        self.store.clear().await;
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        tracing::info!(records = count, "debug state store cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHost;
    use crate::host::HostCommand;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const PAGE: PageSessionId = PageSessionId(21);

    fn service() -> (Arc<RecordingHost>, DebugStateService) {
        let host = Arc::new(RecordingHost::new());
        let service = DebugStateService::new(host.clone());
        (host, service)
    }

    #[tokio::test]
    async fn test_get_defaults_to_disabled() {
        let (_, service) = service();
        assert_eq!(service.get(PAGE).await, PageDebugRecord::DISABLED);
    }

    #[tokio::test]
    async fn test_set_enable_effects() {
        let (host, service) = service();
        let record = service.set(PAGE, true, DebugMode::Assets).await;
        assert_eq!(record, PageDebugRecord::enabled(DebugMode::Assets));
        assert_eq!(service.get(PAGE).await, record);
        assert_eq!(host.command_names(), vec!["set_icon", "show_tooltips"]);
    }

    #[tokio::test]
    async fn test_set_disable_turns_inspector_off_first() {
        let (host, service) = service();
        host.set_inspector_active(PAGE, true);
        service.set(PAGE, true, DebugMode::Normal).await;
        host.clear_log();

        let record = service.set(PAGE, false, DebugMode::Assets).await;
        assert_eq!(record, PageDebugRecord::DISABLED);
        assert_eq!(
            host.commands(),
            vec![
                HostCommand::SetInspector {
                    page_session_id: PAGE,
                    enabled: false
                },
                HostCommand::SetIcon {
                    page_session_id: PAGE,
                    enabled: false
                },
                HostCommand::BlockTooltips { page_session_id: PAGE },
            ]
        );
        assert!(!host.inspector_state(PAGE).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_is_idempotent() {
        let (_, service) = service();
        let first = service.set(PAGE, true, DebugMode::Normal).await;
        let second = service.set(PAGE, true, DebugMode::Normal).await;
        assert_eq!(first, second);
        assert_eq!(service.store().len().await, 1);
    }

    #[tokio::test]
    async fn test_host_failures_do_not_block_the_write() {
        let (host, service) = service();
        host.fail("set_icon");
        host.fail("show_tooltips");
        service.set(PAGE, true, DebugMode::Normal).await;
        assert!(service.get(PAGE).await.is_enabled());
    }

    #[tokio::test]
    async fn test_end_session_and_shutdown() {
        let (_, service) = service();
        service.set(PAGE, true, DebugMode::Normal).await;
        service.set(PageSessionId(22), true, DebugMode::Normal).await;

        service.end_session(PAGE).await;
        assert_eq!(service.store().lookup(PAGE).await, None);
        assert_eq!(service.store().len().await, 1);
        assert!(!service.locks.contains_key(&PAGE));

        service.shutdown().await;
        assert!(service.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_lock_serializes_same_page() {
        let (_, service) = service();
        let service = Arc::new(service);
        let guard = service.lock(PAGE).await;

        let other = {
            let service = service.clone();
            tokio::spawn(async move { service.set(PAGE, true, DebugMode::Normal).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(service.get(PAGE).await, PageDebugRecord::DISABLED);

        drop(guard);
        other.await.unwrap();
        assert!(service.get(PAGE).await.is_enabled());
    }

    #[tokio::test]
    async fn test_writer_queued_behind_end_session_keeps_lock() {
        let (_, service) = service();
        let service = Arc::new(service);
        let first = service.lock(PAGE).await;

        let ending = {
            let service = service.clone();
            tokio::spawn(async move { service.end_session(PAGE).await })
        };
        tokio::task::yield_now().await;

        let (acquired_tx, acquired_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let late = {
            let service = service.clone();
            tokio::spawn(async move {
                let _guard = service.lock(PAGE).await;
                let _ = acquired_tx.send(());
                let _ = release_rx.await;
            })
        };
        tokio::task::yield_now().await;

        drop(first);
        ending.await.unwrap();
        acquired_rx.await.unwrap();

        // The late writer still holds the page, so a newcomer must wait.
        let newcomer = tokio::time::timeout(Duration::from_millis(50), service.lock(PAGE)).await;
        assert!(newcomer.is_err());

        release_tx.send(()).unwrap();
        late.await.unwrap();
        let guard = service.lock(PAGE).await;
        assert_eq!(guard.page_session_id(), PAGE);
    }
}
