// crates/core/src/store.rs
//! Authoritative per-page debug-state table.
//!
//! Process-lifetime only: entries appear on the first write for a page,
//! are overwritten by every later write, and are purged when the page goes
//! away or the owning process shuts down.

use std::collections::HashMap;

use odoo_inspector_types::{PageDebugRecord, PageSessionId};
use tokio::sync::RwLock;

/// Whether an upsert created the entry or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated { previous: PageDebugRecord },
}

#[derive(Default)]
pub struct DebugStateStore {
    records: RwLock<HashMap<PageSessionId, PageDebugRecord>>,
}

impl DebugStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record, or the disabled default for unknown pages.
    pub async fn get(&self, id: PageSessionId) -> PageDebugRecord {
        self.lookup(id).await.unwrap_or_default()
    }

    /// Current record, `None` when the page has never been written.
    pub async fn lookup(&self, id: PageSessionId) -> Option<PageDebugRecord> {
        self.records.read().await.get(&id).copied()
    }

    pub async fn upsert(&self, id: PageSessionId, record: PageDebugRecord) -> Upsert {
        let previous = self.records.write().await.insert(id, record);
        match previous {
            None => {
                tracing::debug!(page_session_id = %id, enabled = record.is_enabled(), "debug record created");
                Upsert::Created
            }
            Some(previous) => Upsert::Updated { previous },
        }
    }

    pub async fn purge(&self, id: PageSessionId) -> Option<PageDebugRecord> {
        let removed = self.records.write().await.remove(&id);
        if removed.is_some() {
            tracing::debug!(page_session_id = %id, "debug record purged");
        }
        removed
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
