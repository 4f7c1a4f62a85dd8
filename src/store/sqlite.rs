use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::{
    ContactRecord, DeliveryStatus, MoveOutcome, Partition, RecordStore, StoreError, StoredRecord,
};

/// SQLite-backed record store. All partitions share one `records` table and
/// moves run inside a transaction.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and run migrations if enabled
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> Result<Self, StoreError> {
        if !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        Self::with_pool(pool, auto_migrate).await
    }

    pub async fn with_pool(pool: SqlitePool, auto_migrate: bool) -> Result<Self, StoreError> {
        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }
        Ok(Self { pool })
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }

    fn row_to_record(row: &SqliteRow) -> Result<StoredRecord, StoreError> {
        let id: String = row.try_get("id")?;
        let status: Option<String> = row.try_get("status")?;
        let timestamp: Option<String> = row.try_get("timestamp")?;

        let status = match status.as_deref() {
            None => None,
            Some("delivered") => Some(DeliveryStatus::Delivered),
            Some(other) => {
                return Err(StoreError::CorruptRecord {
                    id,
                    reason: format!("unknown status '{other}'"),
                })
            }
        };
        let timestamp = match timestamp {
            None => None,
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| StoreError::CorruptRecord {
                        id: id.clone(),
                        reason: format!("bad timestamp '{raw}': {e}"),
                    })?
                    .with_timezone(&Utc),
            ),
        };

        Ok(StoredRecord {
            id,
            record: ContactRecord {
                name: row.try_get("name")?,
                phone: row.try_get("phone")?,
                status,
                timestamp,
            },
        })
    }

    async fn insert_with<'e, E>(
        executor: E,
        partition: Partition,
        record: ContactRecord,
    ) -> Result<StoredRecord, StoreError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let id = Uuid::new_v4().simple().to_string();
        sqlx::query(
            r#"
            INSERT INTO records (id, partition, name, phone, status, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(partition.as_str())
        .bind(&record.name)
        .bind(&record.phone)
        .bind(record.status.map(|s| s.as_str()))
        .bind(
            record
                .timestamp
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true)),
        )
        .execute(executor)
        .await?;

        Ok(StoredRecord { id, record })
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert(
        &self,
        partition: Partition,
        record: ContactRecord,
    ) -> Result<StoredRecord, StoreError> {
        Self::insert_with(&self.pool, partition, record).await
    }

    async fn delete(
        &self,
        partition: Partition,
        id: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        if partition.is_append_only() {
            return Err(StoreError::AppendOnly { partition });
        }

        let row = sqlx::query(
            r#"
            DELETE FROM records
            WHERE partition = ?1 AND id = ?2
            RETURNING id, name, phone, status, timestamp
            "#,
        )
        .bind(partition.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn find_by_contact(
        &self,
        partition: Partition,
        name: &str,
        phone: &str,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, phone, status, timestamp
            FROM records
            WHERE partition = ?1 AND name = ?2 AND phone = ?3
            ORDER BY seq ASC
            "#,
        )
        .bind(partition.as_str())
        .bind(name)
        .bind(phone)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn list(&self, partition: Partition) -> Result<Vec<StoredRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, phone, status, timestamp
            FROM records
            WHERE partition = ?1
            ORDER BY seq ASC
            "#,
        )
        .bind(partition.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
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

        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM records
            WHERE partition = ?1 AND id = ?2
            RETURNING id, name, phone, status, timestamp
            "#,
        )
        .bind(from.as_str())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .as_ref()
        .map(Self::row_to_record)
        .transpose()?;

        let created = Self::insert_with(&mut *tx, to, record).await?;
        tx.commit().await?;

        Ok(MoveOutcome { removed, created })
    }

    async fn close(&self) {
        self.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::with_pool(pool, true).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_list_and_find() {
        let store = memory_store().await;
        let alice = store
            .insert(Partition::InWork, ContactRecord::new("Alice", "+15551234"))
            .await
            .unwrap();
        store
            .insert(Partition::InWork, ContactRecord::new("Bob", "555"))
            .await
            .unwrap();

        let listed = store.list(Partition::InWork).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0], alice);

        let found = store
            .find_by_contact(Partition::InWork, "Bob", "555")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record.name, "Bob");
    }

    #[tokio::test]
    async fn test_move_to_history_round_trips_delivery_fields() {
        let store = memory_store().await;
        let ready = store
            .insert(
                Partition::ReadyForDelivery,
                ContactRecord::new("Alice", "+15551234"),
            )
            .await
            .unwrap();

        let delivered_at = Utc::now();
        let outcome = store
            .move_record(
                Partition::ReadyForDelivery,
                &ready.id,
                Partition::History,
                ContactRecord::new("Alice", "+15551234").delivered(delivered_at),
            )
            .await
            .unwrap();

        assert_eq!(outcome.removed, Some(ready));
        assert!(store
            .list(Partition::ReadyForDelivery)
            .await
            .unwrap()
            .is_empty());

        let history = store.list(Partition::History).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].record.status, Some(DeliveryStatus::Delivered));
        let stored_at = history[0].record.timestamp.unwrap();
        assert_eq!(stored_at.timestamp_micros(), delivered_at.timestamp_micros());
    }

    #[tokio::test]
    async fn test_history_is_append_only() {
        let store = memory_store().await;
        let err = store.delete(Partition::History, "x").await.unwrap_err();
        assert!(matches!(err, StoreError::AppendOnly { .. }));
    }
}
