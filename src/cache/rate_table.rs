use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::store::CacheStore;
use crate::shared::AppError;
use crate::strategy::models::StrategyAward;

pub const STRATEGY_AWARD_KEY: &str = "big_market_strategy_award_key_";
pub const STRATEGY_RATE_TABLE_KEY: &str = "big_market_strategy_rate_table_key_";
pub const STRATEGY_RATE_RANGE_KEY: &str = "big_market_strategy_rate_range_key_";

/// Lookup key of a strategy table: `"<strategyId>"` or `"<strategyId>_<tierKey>"`
///
/// The tier key is the threshold token of the weight group, so the 4000 tier of
/// strategy 100001 lives under `100001_4000`, never under the whole group text
/// (`100001_4000:102,103`). Armory and dispatcher both rely on this format.
pub fn strategy_key(strategy_id: i64, tier_key: Option<&str>) -> String {
    match tier_key {
        Some(tier) => format!("{}_{}", strategy_id, tier),
        None => strategy_id.to_string(),
    }
}

/// Reads and writes rate range / lookup table pairs in the shared cache
///
/// The table is always written before its range and the range is always read
/// before the table, so a reader that sees a new range also sees the table it
/// was built with.
#[derive(Clone)]
pub struct RateTableCache {
    store: Arc<dyn CacheStore>,
}

impl RateTableCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Stores `table` under `key`; the stored range is the table length
    ///
    /// Fields left over from a longer previous table are removed once the new
    /// range is published, so the hash ends up exactly `rate_range` long.
    #[instrument(skip(self, table), fields(rate_range = table.len()))]
    pub async fn store_rate_table(&self, key: &str, table: &[i64]) -> Result<(), AppError> {
        let rate_range = u32::try_from(table.len()).map_err(|_| {
            AppError::IllegalParameter(format!("lookup table for {} is too large", key))
        })?;

        let table_key = format!("{}{}", STRATEGY_RATE_TABLE_KEY, key);
        let entries: HashMap<u32, i64> = (0..rate_range).zip(table.iter().copied()).collect();

        if rate_range > 0 {
            self.store.put_all(&table_key, entries).await?;
        }
        self.store
            .set_value(
                &format!("{}{}", STRATEGY_RATE_RANGE_KEY, key),
                rate_range.to_string(),
            )
            .await?;

        self.trim_table(&table_key, rate_range).await?;

        debug!(key, rate_range, "Rate table stored");
        Ok(())
    }

    async fn trim_table(&self, table_key: &str, rate_range: u32) -> Result<(), AppError> {
        if rate_range == 0 {
            self.store.delete(table_key).await?;
            return Ok(());
        }

        let stored = u32::try_from(self.store.map_len(table_key).await?).unwrap_or(u32::MAX);
        if stored > rate_range {
            let stale: Vec<u32> = (rate_range..stored).collect();
            let removed = self.store.remove_from_map(table_key, &stale).await?;
            debug!(table_key, removed, "Trimmed stale rate table entries");
        }
        Ok(())
    }

    pub async fn get_rate_range(&self, key: &str) -> Result<u32, AppError> {
        let raw = self
            .store
            .get_value(&format!("{}{}", STRATEGY_RATE_RANGE_KEY, key))
            .await?
            .ok_or_else(|| AppError::RangeNotFound(key.to_string()))?;

        raw.parse::<u32>().map_err(|e| {
            warn!(key, raw = %raw, "Corrupt rate range in cache");
            AppError::CacheUnavailable(format!("rate range for {} is not an integer: {}", key, e))
        })
    }

    pub async fn get_award(&self, key: &str, index: u32) -> Result<i64, AppError> {
        self.store
            .get_from_map(&format!("{}{}", STRATEGY_RATE_TABLE_KEY, key), index)
            .await?
            .ok_or_else(|| AppError::RangeNotFound(format!("{} index {}", key, index)))
    }

    pub async fn cached_award_list(
        &self,
        strategy_id: i64,
    ) -> Result<Option<Vec<StrategyAward>>, AppError> {
        let raw = self
            .store
            .get_value(&format!("{}{}", STRATEGY_AWARD_KEY, strategy_id))
            .await?;

        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| AppError::CacheUnavailable(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn store_award_list(
        &self,
        strategy_id: i64,
        awards: &[StrategyAward],
    ) -> Result<(), AppError> {
        let json =
            serde_json::to_string(awards).map_err(|e| AppError::CacheUnavailable(e.to_string()))?;
        self.store
            .set_value(&format!("{}{}", STRATEGY_AWARD_KEY, strategy_id), json)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStore;
    use rstest::rstest;

    fn cache() -> (Arc<InMemoryCacheStore>, RateTableCache) {
        let store = Arc::new(InMemoryCacheStore::new());
        (store.clone(), RateTableCache::new(store))
    }

    #[rstest]
    #[case(100001, None, "100001")]
    #[case(100001, Some("4000"), "100001_4000")]
    #[case(7, Some("6000"), "7_6000")]
    fn builds_strategy_keys(
        #[case] strategy_id: i64,
        #[case] tier: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(strategy_key(strategy_id, tier), expected);
    }

    #[tokio::test]
    async fn stores_range_and_table_under_separate_namespaces() {
        let (store, cache) = cache();
        cache.store_rate_table("100001", &[101, 102, 101]).await.unwrap();

        assert_eq!(
            store
                .get_value("big_market_strategy_rate_range_key_100001")
                .await
                .unwrap()
                .as_deref(),
            Some("3")
        );
        assert_eq!(
            store
                .map_len("big_market_strategy_rate_table_key_100001")
                .await
                .unwrap(),
            3
        );
        assert_eq!(cache.get_rate_range("100001").await.unwrap(), 3);
        assert_eq!(cache.get_award("100001", 1).await.unwrap(), 102);
    }

    #[tokio::test]
    async fn shrinking_rebuild_trims_table_to_range() {
        let (store, cache) = cache();
        let table_key = "big_market_strategy_rate_table_key_1";

        cache
            .store_rate_table("1", &[101, 102, 101, 103, 102, 101])
            .await
            .unwrap();
        cache
            .store_rate_table("1", &[201, 202, 203, 204])
            .await
            .unwrap();

        let range = cache.get_rate_range("1").await.unwrap();
        assert_eq!(range, 4);
        assert_eq!(store.map_len(table_key).await.unwrap(), range as usize);
        for index in 0..range {
            let award_id = cache.get_award("1", index).await.unwrap();
            assert!((201..=204).contains(&award_id));
        }
        assert!(matches!(
            cache.get_award("1", 5).await,
            Err(AppError::RangeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn empty_rebuild_removes_table() {
        let (store, cache) = cache();
        cache.store_rate_table("1", &[101, 102]).await.unwrap();
        cache.store_rate_table("1", &[]).await.unwrap();

        assert_eq!(cache.get_rate_range("1").await.unwrap(), 0);
        assert_eq!(
            store
                .map_len("big_market_strategy_rate_table_key_1")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn missing_range_is_range_not_found() {
        let (_, cache) = cache();
        let err = cache.get_rate_range("42").await.unwrap_err();
        assert!(matches!(err, AppError::RangeNotFound(_)));

        let err = cache.get_award("42", 0).await.unwrap_err();
        assert!(matches!(err, AppError::RangeNotFound(_)));
    }

    #[tokio::test]
    async fn corrupt_range_is_reported_as_cache_failure() {
        let (store, cache) = cache();
        store
            .set_value("big_market_strategy_rate_range_key_9", "abc".to_string())
            .await
            .unwrap();

        let err = cache.get_rate_range("9").await.unwrap_err();
        assert_eq!(err.code(), "CACHE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn award_list_round_trips_through_json() {
        let (_, cache) = cache();
        let awards = vec![crate::shared::test_utils::award(1, 101, "0.0001")];

        assert!(cache.cached_award_list(1).await.unwrap().is_none());
        cache.store_award_list(1, &awards).await.unwrap();

        let cached = cache.cached_award_list(1).await.unwrap().unwrap();
        assert_eq!(cached, awards);
    }
}
