//! Manual queue persistence
//!
//! Read and write persisted manual queue entries. The in-memory manual lane
//! is authoritative while the process runs; this table only makes it survive
//! restarts.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lsq_common::ManualQueueEntry;
use sqlx::{Pool, Row, Sqlite};

/// Persisted manual-queue store
#[async_trait]
pub trait ManualQueueStore: Send + Sync {
    /// All entries, ordered by `order_index` ascending
    async fn load_all(&self) -> Result<Vec<ManualQueueEntry>>;

    /// Insert or replace an entry by id
    async fn upsert(&self, entry: &ManualQueueEntry) -> Result<()>;

    /// Delete one entry; deleting a missing id is not an error
    async fn delete_by_id(&self, id: i64) -> Result<()>;

    /// Delete every entry
    async fn clear(&self) -> Result<()>;
}

/// SQLite implementation over the `manual_queue` table
#[derive(Clone)]
pub struct SqliteManualQueueStore {
    db: Pool<Sqlite>,
}

impl SqliteManualQueueStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ManualQueueStore for SqliteManualQueueStore {
    async fn load_all(&self) -> Result<Vec<ManualQueueEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, catalog_id, order_index, added_at
            FROM manual_queue
            ORDER BY order_index ASC, id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                let added_at: String = row.get("added_at");
                let added_at = DateTime::parse_from_rfc3339(&added_at)
                    .map_err(|e| Error::Persistence(format!("Invalid added_at '{}': {}", added_at, e)))?
                    .with_timezone(&Utc);

                Ok(ManualQueueEntry {
                    id: row.get("id"),
                    catalog_id: row.get("catalog_id"),
                    order_index: row.get("order_index"),
                    added_at,
                })
            })
            .collect()
    }

    async fn upsert(&self, entry: &ManualQueueEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO manual_queue (id, catalog_id, order_index, added_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                catalog_id = excluded.catalog_id,
                order_index = excluded.order_index,
                added_at = excluded.added_at
            "#,
        )
        .bind(entry.id)
        .bind(entry.catalog_id)
        .bind(entry.order_index)
        .bind(entry.added_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM manual_queue WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM manual_queue")
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsq_common::db::init_database;

    async fn create_test_store() -> (tempfile::TempDir, SqliteManualQueueStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("queue.db")).await.unwrap();
        (dir, SqliteManualQueueStore::new(pool))
    }

    fn entry(id: i64, catalog_id: i64, order_index: f64) -> ManualQueueEntry {
        ManualQueueEntry {
            id,
            catalog_id,
            order_index,
            added_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_load_all_orders_by_order_index() {
        let (_dir, store) = create_test_store().await;

        store.upsert(&entry(1, 100, 2.0)).await.unwrap();
        store.upsert(&entry(2, 200, 0.0)).await.unwrap();
        store.upsert(&entry(3, 300, 1.0)).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        let catalog_ids: Vec<i64> = loaded.iter().map(|e| e.catalog_id).collect();
        assert_eq!(catalog_ids, vec![200, 300, 100]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_row() {
        let (_dir, store) = create_test_store().await;

        store.upsert(&entry(1, 100, 0.0)).await.unwrap();
        store.upsert(&entry(1, 100, 5.0)).await.unwrap();

        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].order_index, 5.0);
    }

    #[tokio::test]
    async fn test_added_at_round_trips() {
        let (_dir, store) = create_test_store().await;
        let original = entry(7, 700, 0.0);

        store.upsert(&original).await.unwrap();
        let loaded = store.load_all().await.unwrap();

        assert_eq!(loaded[0].added_at.timestamp_micros(), original.added_at.timestamp_micros());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (_dir, store) = create_test_store().await;

        store.upsert(&entry(1, 100, 0.0)).await.unwrap();
        store.upsert(&entry(2, 200, 1.0)).await.unwrap();

        store.delete_by_id(1).await.unwrap();
        store.delete_by_id(99).await.unwrap();
        assert_eq!(store.load_all().await.unwrap().len(), 1);

        store.clear().await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }
}
