//! Durable checkpoint of the active posting run.
//!
//! Wraps a `KvStore` to persist the whole `PostingRun` under a single key.
//! The record is written after every state transition the advance loop
//! makes and deleted in one call on completion, so the store holds either
//! exactly one resumable run or nothing.

use threadcast_types::run::PostingRun;

use crate::storage::kv_store::KvStore;

/// Namespace holding session state.
pub const SESSION_NAMESPACE: &str = "session";

/// Key of the persisted posting run within [`SESSION_NAMESPACE`].
pub const RUN_KEY: &str = "posting_run";

/// Errors that can occur during checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying store failure.
    #[error("checkpoint storage error: {0}")]
    Repository(String),

    /// A record exists but does not decode as a `PostingRun`.
    #[error("corrupt checkpoint: {0}")]
    Corrupt(String),
}

/// Reads and writes the persisted run record.
///
/// Generic over `K: KvStore` so it works with any storage backend
/// (SQLite, in-memory, etc.).
pub struct RunCheckpoint<K: KvStore> {
    store: K,
}

impl<K: KvStore> RunCheckpoint<K> {
    pub fn new(store: K) -> Self {
        Self { store }
    }

    /// Load the persisted run, if any.
    pub async fn load(&self) -> Result<Option<PostingRun>, CheckpointError> {
        let value = self
            .store
            .get(SESSION_NAMESPACE, RUN_KEY)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;

        match value {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| CheckpointError::Corrupt(e.to_string())),
            None => Ok(None),
        }
    }

    /// Overwrite the persisted run with `run`.
    pub async fn save(&self, run: &PostingRun) -> Result<(), CheckpointError> {
        let value =
            serde_json::to_value(run).map_err(|e| CheckpointError::Corrupt(e.to_string()))?;
        self.store
            .set(SESSION_NAMESPACE, RUN_KEY, &value)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;

        tracing::debug!(
            run_id = %run.id,
            cursor = run.cursor,
            status = %run.status,
            "checkpointed posting run"
        );
        Ok(())
    }

    /// Remove the persisted run.
    pub async fn clear(&self) -> Result<(), CheckpointError> {
        self.store
            .delete(SESSION_NAMESPACE, RUN_KEY)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryKvStore;
    use crate::testing::sample_run;

    #[tokio::test]
    async fn test_save_load_clear() {
        let checkpoint = RunCheckpoint::new(MemoryKvStore::new());
        assert!(checkpoint.load().await.unwrap().is_none());

        let mut run = sample_run(&["a", "b", "c"]);
        run.record_posted();
        checkpoint.save(&run).await.unwrap();

        let loaded = checkpoint.load().await.unwrap().unwrap();
        assert_eq!(loaded.cursor, 1);
        assert_eq!(loaded.items, run.items);
        assert_eq!(loaded.delay_window, run.delay_window);

        checkpoint.clear().await.unwrap();
        assert!(checkpoint.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_reported() {
        let store = MemoryKvStore::new();
        store
            .set(SESSION_NAMESPACE, RUN_KEY, &serde_json::json!({"cursor": "nope"}))
            .await
            .unwrap();
        let checkpoint = RunCheckpoint::new(store);
        assert!(matches!(
            checkpoint.load().await,
            Err(CheckpointError::Corrupt(_))
        ));
    }
}
