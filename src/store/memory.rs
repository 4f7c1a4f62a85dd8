use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ContactRecord, MoveOutcome, Partition, RecordStore, StoreError, StoredRecord};

/// Process-local record store. Each partition keeps insertion order; a move
/// happens under a single write lock so it is never observed half done.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    partitions: RwLock<HashMap<Partition, Vec<StoredRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn take(
        partitions: &mut HashMap<Partition, Vec<StoredRecord>>,
        partition: Partition,
        id: &str,
    ) -> Option<StoredRecord> {
        let records = partitions.get_mut(&partition)?;
        let index = records.iter().position(|r| r.id == id)?;
        Some(records.remove(index))
    }

    fn push(
        partitions: &mut HashMap<Partition, Vec<StoredRecord>>,
        partition: Partition,
        record: ContactRecord,
    ) -> StoredRecord {
        let stored = StoredRecord {
            id: Self::generate_id(),
            record,
        };
        partitions
            .entry(partition)
            .or_default()
            .push(stored.clone());
        stored
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert(
        &self,
        partition: Partition,
        record: ContactRecord,
    ) -> Result<StoredRecord, StoreError> {
        let mut partitions = self.partitions.write().await;
        let stored = Self::push(&mut partitions, partition, record);
        debug!(partition = %partition, id = %stored.id, "Inserted record");
        Ok(stored)
    }

    async fn delete(
        &self,
        partition: Partition,
        id: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        if partition.is_append_only() {
            return Err(StoreError::AppendOnly { partition });
        }
        let mut partitions = self.partitions.write().await;
        Ok(Self::take(&mut partitions, partition, id))
    }

    async fn find_by_contact(
        &self,
        partition: Partition,
        name: &str,
        phone: &str,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(&partition)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.record.name == name && r.record.phone == phone)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(&self, partition: Partition) -> Result<Vec<StoredRecord>, StoreError> {
        let partitions = self.partitions.read().await;
        Ok(partitions.get(&partition).cloned().unwrap_or_default())
    }

    async fn move_record(
        &self,
        from: Partition,
        id: &str,
        to: Partition,
        record: ContactRecord,
    ) -> Result<MoveOutcome, StoreError> {
        if from.is_append_only() {
            return Err(StoreError::AppendOnly { partition: from });
        }
        let mut partitions = self.partitions.write().await;
        let removed = Self::take(&mut partitions, from, id);
        let created = Self::push(&mut partitions, to, record);
        debug!(
            from = %from,
            to = %to,
            removed = removed.is_some(),
            id = %created.id,
            "Moved record"
        );
        Ok(MoveOutcome { removed, created })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_unique_ids_and_keeps_order() {
        let store = InMemoryStore::new();
        let first = store
            .insert(Partition::InWork, ContactRecord::new("Alice", "+15551234"))
            .await
            .unwrap();
        let second = store
            .insert(Partition::InWork, ContactRecord::new("Bob", "555"))
            .await
            .unwrap();

        assert!(!first.id.is_empty());
        assert_ne!(first.id, second.id);

        let listed = store.list(Partition::InWork).await.unwrap();
        assert_eq!(listed, vec![first, second]);
        assert!(store.list(Partition::History).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_contact_requires_both_fields() {
        let store = InMemoryStore::new();
        store
            .insert(Partition::InWork, ContactRecord::new("Bob", "555"))
            .await
            .unwrap();

        assert_eq!(
            store
                .find_by_contact(Partition::InWork, "Bob", "555")
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .find_by_contact(Partition::InWork, "Bob", "556")
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .find_by_contact(Partition::InWork, "bob", "555")
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .find_by_contact(Partition::ReadyForDelivery, "Bob", "555")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_delete_absent_id_is_not_an_error() {
        let store = InMemoryStore::new();
        let removed = store.delete(Partition::InWork, "missing").await.unwrap();
        assert!(removed.is_none());
    }

    #[tokio::test]
    async fn test_history_rejects_delete() {
        let store = InMemoryStore::new();
        let entry = store
            .insert(
                Partition::History,
                ContactRecord::new("Alice", "+15551234").delivered(chrono::Utc::now()),
            )
            .await
            .unwrap();

        let err = store.delete(Partition::History, &entry.id).await.unwrap_err();
        assert!(matches!(err, StoreError::AppendOnly { .. }));
        assert_eq!(store.list(Partition::History).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_move_only_touches_source_partition() {
        let store = InMemoryStore::new();
        let ready = store
            .insert(Partition::ReadyForDelivery, ContactRecord::new("Carol", "777"))
            .await
            .unwrap();

        // Same id, wrong source partition: nothing removed, destination still written.
        let outcome = store
            .move_record(
                Partition::InWork,
                &ready.id,
                Partition::ReadyForDelivery,
                ContactRecord::new("Carol", "777"),
            )
            .await
            .unwrap();

        assert!(outcome.removed.is_none());
        assert_eq!(store.list(Partition::ReadyForDelivery).await.unwrap().len(), 2);
    }
}
