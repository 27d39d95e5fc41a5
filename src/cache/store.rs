use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::shared::AppError;

/// Key-value and hash primitives of the shared cache
///
/// Every instance of the engine talks to the same store, so anything the armory
/// writes here is visible to draws served by other processes.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_value(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set_value(&self, key: &str, value: String) -> Result<(), AppError>;

    /// Merges `entries` into the hash stored at `key`, creating it if absent
    async fn put_all(&self, key: &str, entries: HashMap<u32, i64>) -> Result<(), AppError>;
    async fn get_from_map(&self, key: &str, field: u32) -> Result<Option<i64>, AppError>;

    /// Number of fields in the hash at `key`, 0 when absent
    async fn map_len(&self, key: &str) -> Result<usize, AppError>;

    /// Removes `indexes` from the hash at `key`, returning how many existed
    async fn remove_from_map(&self, key: &str, indexes: &[u32]) -> Result<usize, AppError>;

    /// Removes both the scalar and the hash stored at `key`
    async fn delete(&self, key: &str) -> Result<bool, AppError>;
}

/// In-memory implementation of CacheStore for development and testing
///
/// Shared across tasks of a single process only; a deployment spanning several
/// processes needs a networked store behind the same trait.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    values: RwLock<HashMap<String, String>>,
    maps: RwLock<HashMap<String, HashMap<u32, i64>>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    #[instrument(skip(self))]
    async fn get_value(&self, key: &str) -> Result<Option<String>, AppError> {
        let value = self.values.read().await.get(key).cloned();
        debug!(key, hit = value.is_some(), "Read cache value");
        Ok(value)
    }

    #[instrument(skip(self, value))]
    async fn set_value(&self, key: &str, value: String) -> Result<(), AppError> {
        debug!(key, "Writing cache value");
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    #[instrument(skip(self, entries))]
    async fn put_all(&self, key: &str, entries: HashMap<u32, i64>) -> Result<(), AppError> {
        debug!(key, fields = entries.len(), "Merging cache hash");
        self.maps
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .extend(entries);
        Ok(())
    }

    async fn get_from_map(&self, key: &str, field: u32) -> Result<Option<i64>, AppError> {
        Ok(self
            .maps
            .read()
            .await
            .get(key)
            .and_then(|map| map.get(&field))
            .copied())
    }

    async fn map_len(&self, key: &str) -> Result<usize, AppError> {
        Ok(self.maps.read().await.get(key).map_or(0, HashMap::len))
    }

    #[instrument(skip(self, indexes), fields(count = indexes.len()))]
    async fn remove_from_map(&self, key: &str, indexes: &[u32]) -> Result<usize, AppError> {
        let mut maps = self.maps.write().await;
        let Some(map) = maps.get_mut(key) else {
            return Ok(0);
        };

        let removed = indexes.iter().filter(|i| map.remove(i).is_some()).count();
        debug!(key, removed, "Removed cache hash fields");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let removed_value = self.values.write().await.remove(key).is_some();
        let removed_map = self.maps.write().await.remove(key).is_some();
        Ok(removed_value || removed_map)
    }
}
