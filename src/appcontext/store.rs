//! Key/value backing store for AppContext documents.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Result, StoreError};

/// Interface for AppContext persistence.
///
/// Keys are `/`-terminated paths; a document is every key under its root
/// prefix. Implementations must make each single call atomic.
///
/// Implementations:
/// - `MemoryContextStore`: in-process map, used by the sample controller and tests
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Insert or replace the value at `key`.
    async fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Read the value at `key`.
    async fn get(&self, key: &str) -> Result<Value>;

    /// All keys starting with `prefix`, in lexical order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove a single key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key starting with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;

    /// Add one to the counter at `key` and return the new value. A missing
    /// key counts as zero.
    async fn increment(&self, key: &str) -> Result<u64>;
}

/// In-memory context store.
#[derive(Default)]
pub struct MemoryContextStore {
    items: RwLock<BTreeMap<String, Value>>,
    fail_on_put: RwLock<bool>,
    fail_on_get: RwLock<bool>,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_put(&self, fail: bool) {
        *self.fail_on_put.write().await = fail;
    }

    pub async fn set_fail_on_get(&self, fail: bool) {
        *self.fail_on_get.write().await = fail;
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn put(&self, key: &str, value: Value) -> Result<()> {
        if *self.fail_on_put.read().await {
            return Err(StoreError::Backend(format!("put rejected for {}", key)));
        }
        self.items.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Value> {
        if *self.fail_on_get.read().await {
            return Err(StoreError::Backend(format!("get rejected for {}", key)));
        }
        self.items
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let items = self.items.read().await;
        Ok(items
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.items.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        self.items.write().await.retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<u64> {
        if *self.fail_on_put.read().await {
            return Err(StoreError::Backend(format!("increment rejected for {}", key)));
        }
        let mut items = self.items.write().await;
        let next = items.get(key).and_then(Value::as_u64).unwrap_or(0) + 1;
        items.insert(key.to_string(), Value::from(next));
        Ok(next)
    }
}
