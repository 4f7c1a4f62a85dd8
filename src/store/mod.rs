//! Record store abstractions
//!
//! The workflow keeps every contact record in one of three partitions. This
//! module defines the record types and the `RecordStore` trait the engine is
//! built on, so the engine can run against the in-memory store, SQLite, or a
//! test double without knowing which.

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{StoreBackend, StoreConfig};

#[cfg(test)]
use mockall::automock;

pub use memory::InMemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

pub type RecordId = String;

/// Lifecycle stage of a contact record. Presence in a partition is the
/// record's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Partition {
    InWork,
    ReadyForDelivery,
    History,
}

impl Partition {
    /// Collection name used on the wire and in persistent storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::InWork => "inWork",
            Partition::ReadyForDelivery => "readyForDelivery",
            Partition::History => "history",
        }
    }

    /// The only partition a record may move to from this one
    pub fn next(&self) -> Option<Partition> {
        match self {
            Partition::InWork => Some(Partition::ReadyForDelivery),
            Partition::ReadyForDelivery => Some(Partition::History),
            Partition::History => None,
        }
    }

    pub fn is_append_only(&self) -> bool {
        matches!(self, Partition::History)
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Delivered => "delivered",
        }
    }
}

/// Stored fields of a contact. `status` and `timestamp` only exist on
/// history entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ContactRecord {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            status: None,
            timestamp: None,
        }
    }

    pub fn delivered(mut self, at: DateTime<Utc>) -> Self {
        self.status = Some(DeliveryStatus::Delivered);
        self.timestamp = Some(at);
        self
    }

    pub fn same_contact(&self, other: &ContactRecord) -> bool {
        self.name == other.name && self.phone == other.phone
    }
}

/// A persisted record annotated with its store-assigned id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: ContactRecord,
}

/// Result of moving a record between partitions. `removed` is `None` when the
/// id was not present in the source partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub removed: Option<StoredRecord>,
    pub created: StoredRecord,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{message}")]
    Backend { message: String },
    #[error("Partition '{partition}' is append-only")]
    AppendOnly { partition: Partition },
    #[error("Record {id} is corrupt: {reason}")]
    CorruptRecord { id: RecordId, reason: String },
    #[error("Store backend '{backend}' is not available in this build")]
    UnsupportedBackend { backend: String },
    #[cfg(feature = "database")]
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[cfg(feature = "database")]
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }
}

/// Document store grouped into the three workflow partitions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record and return it with its newly assigned id
    async fn insert(
        &self,
        partition: Partition,
        record: ContactRecord,
    ) -> Result<StoredRecord, StoreError>;

    /// Delete by id. Deleting an absent id is not an error; the removed record
    /// is returned when there was one.
    async fn delete(
        &self,
        partition: Partition,
        id: &str,
    ) -> Result<Option<StoredRecord>, StoreError>;

    /// All records whose name and phone both match exactly
    async fn find_by_contact(
        &self,
        partition: Partition,
        name: &str,
        phone: &str,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Every record of a partition in insertion order
    async fn list(&self, partition: Partition) -> Result<Vec<StoredRecord>, StoreError>;

    /// Release backend resources at shutdown
    async fn close(&self) {}

    /// Remove `id` from `from` and insert `record` into `to`.
    ///
    /// Backends with transactions override this to run atomically. The
    /// default deletes then inserts, and puts the removed record back into
    /// `from` when the insert fails.
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

        let removed = self.delete(from, id).await?;
        match self.insert(to, record).await {
            Ok(created) => Ok(MoveOutcome { removed, created }),
            Err(insert_err) => {
                if let Some(previous) = &removed {
                    warn!(
                        id = %previous.id,
                        from = %from,
                        to = %to,
                        "Insert failed after delete, restoring record to source partition"
                    );
                    if let Err(restore_err) = self.insert(from, previous.record.clone()).await {
                        error!(
                            id = %previous.id,
                            from = %from,
                            error = %restore_err,
                            "Failed to restore record after aborted move"
                        );
                    }
                }
                Err(insert_err)
            }
        }
    }
}

/// Open the store selected by configuration
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory record store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        #[cfg(feature = "database")]
        StoreBackend::Sqlite => {
            info!("Using SQLite record store at {}", config.url);
            let store =
                SqliteStore::connect(&config.url, config.max_connections, config.auto_migrate)
                    .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "database"))]
        StoreBackend::Sqlite => Err(StoreError::UnsupportedBackend {
            backend: "sqlite".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Delegates to the in-memory store but refuses inserts into one partition
    /// while `failing` is set. Relies on the trait's default `move_record`.
    struct FlakyStore {
        inner: InMemoryStore,
        fail_partition: Partition,
        failing: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn insert(
            &self,
            partition: Partition,
            record: ContactRecord,
        ) -> Result<StoredRecord, StoreError> {
            if partition == self.fail_partition && self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::backend("deadline exceeded"));
            }
            self.inner.insert(partition, record).await
        }

        async fn delete(
            &self,
            partition: Partition,
            id: &str,
        ) -> Result<Option<StoredRecord>, StoreError> {
            self.inner.delete(partition, id).await
        }

        async fn find_by_contact(
            &self,
            partition: Partition,
            name: &str,
            phone: &str,
        ) -> Result<Vec<StoredRecord>, StoreError> {
            self.inner.find_by_contact(partition, name, phone).await
        }

        async fn list(&self, partition: Partition) -> Result<Vec<StoredRecord>, StoreError> {
            self.inner.list(partition).await
        }
    }

    #[test]
    fn test_partition_order_is_forward_only() {
        assert_eq!(Partition::InWork.next(), Some(Partition::ReadyForDelivery));
        assert_eq!(Partition::ReadyForDelivery.next(), Some(Partition::History));
        assert_eq!(Partition::History.next(), None);
        assert!(Partition::History.is_append_only());
    }

    #[test]
    fn test_stored_record_serializes_flat() {
        let record = StoredRecord {
            id: "abc".to_string(),
            record: ContactRecord::new("Alice", "+15551234"),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "abc", "name": "Alice", "phone": "+15551234"})
        );

        let at = DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let history = StoredRecord {
            id: "h1".to_string(),
            record: ContactRecord::new("Alice", "+15551234").delivered(at),
        };
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["status"], "delivered");
        assert_eq!(json["timestamp"], "2025-03-01T10:00:00Z");
    }

    #[tokio::test]
    async fn test_default_move_restores_source_when_insert_fails() {
        let store = FlakyStore {
            inner: InMemoryStore::new(),
            fail_partition: Partition::ReadyForDelivery,
            failing: AtomicBool::new(true),
        };
        let original = store
            .insert(Partition::InWork, ContactRecord::new("Alice", "+15551234"))
            .await
            .unwrap();

        let err = store
            .move_record(
                Partition::InWork,
                &original.id,
                Partition::ReadyForDelivery,
                ContactRecord::new("Alice", "+15551234"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "deadline exceeded");

        let in_work = store.list(Partition::InWork).await.unwrap();
        assert_eq!(in_work.len(), 1);
        assert_eq!(in_work[0].record, original.record);
        assert!(store.list(Partition::ReadyForDelivery).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_move_succeeds_and_reports_removed() {
        let store = FlakyStore {
            inner: InMemoryStore::new(),
            fail_partition: Partition::History,
            failing: AtomicBool::new(false),
        };
        let original = store
            .insert(Partition::InWork, ContactRecord::new("Bob", "555"))
            .await
            .unwrap();

        let outcome = store
            .move_record(
                Partition::InWork,
                &original.id,
                Partition::ReadyForDelivery,
                ContactRecord::new("Bob", "555"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.removed, Some(original.clone()));
        assert_ne!(outcome.created.id, original.id);
        assert!(store.list(Partition::InWork).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let store = open_store(&StoreConfig::default()).await.unwrap();
        assert!(store.list(Partition::InWork).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_move_rejects_history_source() {
        let store = FlakyStore {
            inner: InMemoryStore::new(),
            fail_partition: Partition::History,
            failing: AtomicBool::new(false),
        };
        let err = store
            .move_record(
                Partition::History,
                "any",
                Partition::InWork,
                ContactRecord::new("Bob", "555"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AppendOnly { .. }));
    }
}
