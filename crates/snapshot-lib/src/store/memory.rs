//! In-process record store for dry runs and tests
//!
//! The store is bounded: once `max_records` rows are held, each insert
//! evicts the oldest row. Row ids keep increasing across evictions.

use super::RecordStore;
use crate::error::StoreError;
use crate::models::{InventoryRecord, ResourceKind};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Default row cap for the memory backend
pub const DEFAULT_MAX_RECORDS: usize = 100_000;

#[derive(Debug, Default)]
struct MemoryState {
    records: VecDeque<InventoryRecord>,
    inserted: i64,
}

/// Keeps the most recent records in insertion order
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    max_records: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_max_records(DEFAULT_MAX_RECORDS)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding at most `max_records` rows (at least one)
    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            max_records: max_records.max(1),
        }
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// Snapshot of all retained records
    pub async fn records(&self) -> Vec<InventoryRecord> {
        self.state.read().await.records.iter().cloned().collect()
    }

    /// Snapshot of the retained records of one kind, in insertion order
    pub async fn records_of(&self, kind: ResourceKind) -> Vec<InventoryRecord> {
        self.state
            .read()
            .await
            .records
            .iter()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: InventoryRecord) -> Result<i64, StoreError> {
        let mut state = self.state.write().await;
        while state.records.len() >= self.max_records {
            state.records.pop_front();
        }
        state.records.push_back(record);
        state.inserted += 1;
        Ok(state.inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchTag, ServiceRecord};

    fn service(name: &str, tag: &BatchTag) -> InventoryRecord {
        ServiceRecord {
            service_name: name.to_string(),
            total_services: "2".to_string(),
            create_time: String::new(),
            record_time: "2024-01-01 00:00:00".to_string(),
            tag: tag.clone(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_memory_store_ids_are_sequential() {
        let store = MemoryStore::new();
        let tag = BatchTag::generate();

        assert_eq!(store.insert(service("a", &tag)).await.unwrap(), 1);
        assert_eq!(store.insert(service("b", &tag)).await.unwrap(), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_memory_store_filters_by_kind() {
        let store = MemoryStore::new();
        let tag = BatchTag::generate();
        store.insert(service("a", &tag)).await.unwrap();

        assert_eq!(store.records_of(ResourceKind::Services).await.len(), 1);
        assert!(store.records_of(ResourceKind::Pods).await.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_evicts_oldest_at_cap() {
        let store = MemoryStore::with_max_records(2);
        let tag = BatchTag::generate();

        for name in ["a", "b", "c"] {
            store.insert(service(name, &tag)).await.unwrap();
        }
        let id = store.insert(service("d", &tag)).await.unwrap();

        assert_eq!(id, 4);
        assert_eq!(store.len().await, 2);
        let names: Vec<_> = store
            .records()
            .await
            .into_iter()
            .map(|r| match r {
                InventoryRecord::Service(s) => s.service_name,
                other => panic!("unexpected record {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["c", "d"]);
    }

    #[test]
    fn test_zero_cap_keeps_one_record() {
        assert_eq!(MemoryStore::with_max_records(0).max_records(), 1);
        assert_eq!(MemoryStore::new().max_records(), DEFAULT_MAX_RECORDS);
    }
}
