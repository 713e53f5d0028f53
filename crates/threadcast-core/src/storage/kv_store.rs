//! Key-value store trait.
//!
//! Defines the interface for namespaced key-value storage.
//! Implementations live in threadcast-infra (SQLite) and `storage::memory`.

use std::sync::Arc;

use threadcast_types::error::RepositoryError;

/// Trait for namespaced key-value persistent storage.
///
/// Stores arbitrary JSON values keyed by namespace and string key.
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a key. No-op if key does not exist.
    fn delete(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List all keys in a namespace, sorted.
    fn list_keys(
        &self,
        namespace: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;
}

/// Shared stores: the orchestrator and license service hold the same backend.
impl<K: KvStore> KvStore for Arc<K> {
    fn get(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, RepositoryError>> + Send
    {
        (**self).get(namespace, key)
    }

    fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        (**self).set(namespace, key, value)
    }

    fn delete(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        (**self).delete(namespace, key)
    }

    fn list_keys(
        &self,
        namespace: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send {
        (**self).list_keys(namespace)
    }
}
