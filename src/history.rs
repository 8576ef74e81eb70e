//! In-memory per-service status history

use crate::models::{ServiceId, StatusRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Working set of status records keyed by service id.
///
/// A missing entry means "not fetched yet"; an empty one means "fetched, no
/// records". Writes for one id never touch another.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    entries: Arc<RwLock<HashMap<ServiceId, Vec<StatusRecord>>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the history of a service with a fresh snapshot
    pub async fn replace(&self, service_id: ServiceId, records: Vec<StatusRecord>) {
        let mut entries = self.entries.write().await;
        debug!("Stored {} records for service {}", records.len(), service_id);
        entries.insert(service_id, records);
    }

    /// Record that a fetch failed: keep known data, otherwise mark as fetched-empty
    pub async fn keep_or_empty(&self, service_id: ServiceId) {
        let mut entries = self.entries.write().await;
        entries.entry(service_id).or_default();
    }

    pub async fn get(&self, service_id: ServiceId) -> Option<Vec<StatusRecord>> {
        self.entries.read().await.get(&service_id).cloned()
    }

    pub async fn contains(&self, service_id: ServiceId) -> bool {
        self.entries.read().await.contains_key(&service_id)
    }

    pub async fn remove(&self, service_id: ServiceId) -> Option<Vec<StatusRecord>> {
        self.entries.write().await.remove(&service_id)
    }

    pub async fn service_ids(&self) -> Vec<ServiceId> {
        let mut ids: Vec<ServiceId> = self.entries.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
        debug!("Cleared all status history");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: u64) -> StatusRecord {
        StatusRecord {
            id,
            up: true,
            latency_ms: Some(120),
            status_code: 200,
            timestamp: Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_absent_and_empty_are_distinct() {
        let store = HistoryStore::new();
        assert_eq!(store.get(1).await, None);

        store.keep_or_empty(1).await;
        assert_eq!(store.get(1).await, Some(vec![]));
        assert!(store.contains(1).await);
    }

    #[tokio::test]
    async fn test_keep_or_empty_preserves_known_data() {
        let store = HistoryStore::new();
        store.replace(1, vec![record(1), record(2)]).await;

        store.keep_or_empty(1).await;

        assert_eq!(store.get(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_and_remove() {
        let store = HistoryStore::new();
        store.replace(1, vec![record(1)]).await;
        store.replace(2, vec![]).await;
        store.replace(1, vec![record(3)]).await;

        assert_eq!(store.get(1).await.unwrap()[0].id, 3);
        assert_eq!(store.service_ids().await, vec![1, 2]);

        assert!(store.remove(1).await.is_some());
        assert_eq!(store.get(1).await, None);

        store.clear().await;
        assert!(store.service_ids().await.is_empty());
    }
}
