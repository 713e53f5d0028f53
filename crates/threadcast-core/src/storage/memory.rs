//! In-memory `KvStore` backed by a mutex-guarded map.
//!
//! Used for dry runs and in tests. Nothing survives the process.

use std::collections::BTreeMap;
use std::sync::Mutex;

use threadcast_types::error::RepositoryError;

use super::kv_store::KvStore;

/// Volatile key-value store.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<BTreeMap<(String, String), serde_json::Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<(String, String), serde_json::Value>>, RepositoryError>
    {
        self.entries.lock().map_err(|_| RepositoryError::Connection)
    }
}

impl KvStore for MemoryKvStore {
    async fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, RepositoryError> {
        let entries = self.lock()?;
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    async fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let mut entries = self.lock()?;
        entries.insert((namespace.to_string(), key.to_string()), value.clone());
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), RepositoryError> {
        let mut entries = self.lock()?;
        entries.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    async fn list_keys(&self, namespace: &str) -> Result<Vec<String>, RepositoryError> {
        let entries = self.lock()?;
        Ok(entries
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, key)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryKvStore::new();
        store.set("session", "run", &json!({"cursor": 1})).await.unwrap();
        assert_eq!(
            store.get("session", "run").await.unwrap(),
            Some(json!({"cursor": 1}))
        );

        store.delete("session", "run").await.unwrap();
        assert!(store.get("session", "run").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = MemoryKvStore::new();
        store.set("session", "a", &json!(1)).await.unwrap();
        store.set("license", "b", &json!(2)).await.unwrap();

        assert_eq!(store.list_keys("session").await.unwrap(), vec!["a"]);
        assert!(store.get("license", "a").await.unwrap().is_none());
    }
}
