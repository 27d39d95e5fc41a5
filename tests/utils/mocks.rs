use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use bigmarket::{AppError, CacheStore};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Cache whose transport is down; every call fails and is counted
#[derive(Default)]
pub struct FailingCacheStore {
    calls: AtomicUsize,
}

impl FailingCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn unavailable(&self, key: &str) -> AppError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        AppError::CacheUnavailable(format!("connection refused while accessing {}", key))
    }
}

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, AppError> {
        Err(self.unavailable(key))
    }

    async fn set_value(&self, key: &str, _value: String) -> Result<(), AppError> {
        Err(self.unavailable(key))
    }

    async fn put_all(&self, key: &str, _entries: HashMap<u32, i64>) -> Result<(), AppError> {
        Err(self.unavailable(key))
    }

    async fn get_from_map(&self, key: &str, _field: u32) -> Result<Option<i64>, AppError> {
        Err(self.unavailable(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        Err(self.unavailable(key))
    }

    async fn map_len(&self, key: &str) -> Result<usize, AppError> {
        Err(self.unavailable(key))
    }

    async fn remove_from_map(&self, key: &str, _indexes: &[u32]) -> Result<usize, AppError> {
        Err(self.unavailable(key))
    }
}
