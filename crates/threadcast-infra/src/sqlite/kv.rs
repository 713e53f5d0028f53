//! SQLite key-value store implementation.
//!
//! Implements `KvStore` from `threadcast-core` using sqlx with split
//! read/write pools. Values are stored as JSON text and decoded on read.

use chrono::Utc;
use sqlx::Row;
use threadcast_core::storage::kv_store::KvStore;
use threadcast_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `KvStore`.
pub struct SqliteKvStore {
    pool: DatabasePool,
}

impl SqliteKvStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl KvStore for SqliteKvStore {
    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let value_str: String = row
                    .try_get("value")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                let value = serde_json::from_str(&value_str)
                    .map_err(|e| RepositoryError::Serialization(format!("invalid JSON value: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO kv_store (namespace, key, value, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(namespace)
        .bind(key)
        .bind(&value_str)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM kv_store WHERE namespace = ? AND key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT key FROM kv_store WHERE namespace = ? ORDER BY key")
            .bind(namespace)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get("key")
                    .map_err(|e| RepositoryError::Query(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use threadcast_core::posting::checkpoint::RunCheckpoint;
    use threadcast_types::run::{DelayWindow, PostingRun, TargetHandle};
    use threadcast_types::thread::{Paragraph, ThreadPayload};

    async fn store() -> (SqliteKvStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = DatabasePool::open(&dir.path().join("kv.db")).await.unwrap();
        (SqliteKvStore::new(pool), dir)
    }

    #[tokio::test]
    async fn test_set_get_overwrite_delete() {
        let (store, _dir) = store().await;
        assert!(store.get("session", "run").await.unwrap().is_none());

        store
            .set("session", "run", &serde_json::json!({"cursor": 1}))
            .await
            .unwrap();
        store
            .set("session", "run", &serde_json::json!({"cursor": 2}))
            .await
            .unwrap();
        let value = store.get("session", "run").await.unwrap().unwrap();
        assert_eq!(value["cursor"], 2);

        store.delete("session", "run").await.unwrap();
        assert!(store.get("session", "run").await.unwrap().is_none());
        store.delete("session", "run").await.unwrap();
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let (store, _dir) = store().await;
        store.set("license", "b", &serde_json::json!(1)).await.unwrap();
        store.set("license", "a", &serde_json::json!(2)).await.unwrap();
        store.set("session", "a", &serde_json::json!(3)).await.unwrap();

        assert_eq!(store.list_keys("license").await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.list_keys("session").await.unwrap(), vec!["a"]);
        assert_eq!(
            store.get("session", "a").await.unwrap(),
            Some(serde_json::json!(3))
        );
    }

    #[tokio::test]
    async fn test_checkpoint_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("restart.db");

        let mut run = PostingRun::new(
            vec![
                ThreadPayload::from_paragraphs("a", vec![Paragraph::plain("first")]),
                ThreadPayload::from_paragraphs("b", vec![Paragraph::plain("second")]),
            ],
            DelayWindow::new(1_000, 2_000),
            TargetHandle::new("tab-3"),
        );
        run.record_posted();

        {
            let pool = DatabasePool::open(&path).await.unwrap();
            RunCheckpoint::new(SqliteKvStore::new(pool))
                .save(&run)
                .await
                .unwrap();
        }

        let pool = DatabasePool::open(&path).await.unwrap();
        let loaded = RunCheckpoint::new(SqliteKvStore::new(pool))
            .load()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, run);
    }
}
