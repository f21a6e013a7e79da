use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::domain::{TransactionId, TransactionRecord};

/// A record shared between request handlers and the sweeper. Every read or
/// write of the record goes through its mutex.
pub type SharedRecord = Arc<Mutex<TransactionRecord>>;

/// In-memory map of every transaction that is still being tracked.
#[derive(Clone, Default)]
pub struct TransactionStore {
    inner: Arc<RwLock<HashMap<TransactionId, SharedRecord>>>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new record under its transaction id. Returns `false` and
    /// leaves the existing record in place if the id is already tracked.
    pub async fn put(&self, record: TransactionRecord) -> bool {
        let mut map = self.inner.write().await;
        if map.contains_key(record.transaction_id()) {
            return false;
        }
        map.insert(
            record.transaction_id().to_string(),
            Arc::new(Mutex::new(record)),
        );
        true
    }

    pub async fn get(&self, transaction_id: &str) -> Option<SharedRecord> {
        self.inner.read().await.get(transaction_id).cloned()
    }

    /// Removes a record. Returns whether it was present.
    pub async fn delete(&self, transaction_id: &str) -> bool {
        self.inner.write().await.remove(transaction_id).is_some()
    }

    /// Point-in-time copy of all entries. Records added or removed after the
    /// call are not reflected.
    pub async fn entries(&self) -> Vec<(TransactionId, SharedRecord)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    /// Visits every entry of a snapshot taken at the call. Entries deleted
    /// while visiting are still visited once.
    pub async fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, &SharedRecord),
    {
        for (id, record) in self.entries().await {
            visitor(&id, &record);
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntranceCode, Purpose};
    use chrono::{Duration, Utc};

    fn record(id: &str) -> TransactionRecord {
        let now = Utc::now();
        TransactionRecord::new(
            id.to_string(),
            EntranceCode::new("ec".to_string()),
            Purpose::Donation,
            now,
            now + Duration::hours(12),
        )
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = TransactionStore::new();
        assert!(store.is_empty().await);

        assert!(store.put(record("trx-1")).await);
        let found = store.get("trx-1").await.expect("stored record");
        assert_eq!(found.lock().await.transaction_id(), "trx-1");
        assert_eq!(store.len().await, 1);

        assert!(store.delete("trx-1").await);
        assert!(!store.delete("trx-1").await);
        assert!(store.get("trx-1").await.is_none());
    }

    #[tokio::test]
    async fn test_put_refuses_duplicate_id() {
        let store = TransactionStore::new();
        assert!(store.put(record("trx-1")).await);
        let original = store.get("trx-1").await.unwrap();

        assert!(!store.put(record("trx-1")).await);
        let current = store.get("trx-1").await.unwrap();
        assert!(Arc::ptr_eq(&original, &current));
    }

    #[tokio::test]
    async fn test_traversal_tolerates_deletion() {
        let store = TransactionStore::new();
        for i in 0..10 {
            store.put(record(&format!("trx-{}", i))).await;
        }

        let mut seen = Vec::new();
        for (id, _) in store.entries().await {
            assert!(store.delete(&id).await);
            seen.push(id);
        }

        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 10);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_for_each_tolerates_deletion() {
        let store = TransactionStore::new();
        for i in 0..10 {
            store.put(record(&format!("trx-{}", i))).await;
        }

        // The snapshot is taken before the first visit, so the map lock is free.
        let mut seen = Vec::new();
        store
            .for_each(|id, _| {
                assert!(futures::executor::block_on(store.delete(id)));
                seen.push(id.to_string());
            })
            .await;

        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 10);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_entries_snapshot_survives_removal() {
        let store = TransactionStore::new();
        store.put(record("a")).await;
        store.put(record("b")).await;

        let snapshot = store.entries().await;
        for (id, _) in &snapshot {
            store.delete(id).await;
        }

        assert_eq!(snapshot.len(), 2);
        assert!(store.is_empty().await);
    }
}
