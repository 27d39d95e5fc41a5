use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::{RateTable, StrategyAward, StrategyConfig, StrategyRule};
use super::rule::RuleModel;
use super::seed::SeedData;
use crate::cache::{CacheStore, RateTableCache};
use crate::shared::AppError;

/// Records and shared-cache primitives the raffle engine consumes
#[async_trait]
pub trait StrategyRepository: Send + Sync {
    async fn query_strategy_award_list(
        &self,
        strategy_id: i64,
    ) -> Result<Vec<StrategyAward>, AppError>;

    async fn query_strategy(&self, strategy_id: i64) -> Result<Option<StrategyConfig>, AppError>;

    async fn query_strategy_rule(
        &self,
        strategy_id: i64,
        rule_model: RuleModel,
    ) -> Result<Option<StrategyRule>, AppError>;

    /// Rule value of a strategy level rule (`award_id` None) or of a single award
    async fn query_strategy_rule_value(
        &self,
        strategy_id: i64,
        award_id: Option<i64>,
        rule_model: RuleModel,
    ) -> Result<Option<String>, AppError>;

    /// Comma separated rule models bound to one award of the strategy
    async fn query_strategy_award_rule_models(
        &self,
        strategy_id: i64,
        award_id: i64,
    ) -> Result<Option<String>, AppError>;

    /// Publishes `table` and its range under `key`
    async fn store_rate_table(&self, key: &str, table: &RateTable) -> Result<(), AppError>;

    /// Fails with `RangeNotFound` when nothing was assembled under `key`
    async fn get_rate_range(&self, key: &str) -> Result<u32, AppError>;

    async fn get_strategy_award_assemble(&self, key: &str, index: u32) -> Result<i64, AppError>;
}

#[derive(Debug, Default)]
struct StrategyRecords {
    strategies: Vec<StrategyConfig>,
    awards: Vec<StrategyAward>,
    rules: Vec<StrategyRule>,
}

/// In-memory implementation of StrategyRepository for development and testing
///
/// Strategy, award and rule records live in process memory; lookup tables go
/// through the given cache store like they do for every other implementation.
pub struct InMemoryStrategyRepository {
    records: RwLock<StrategyRecords>,
    rate_tables: RateTableCache,
}

impl InMemoryStrategyRepository {
    /// Creates an empty repository
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self::with_records(cache, Vec::new(), Vec::new(), Vec::new())
    }

    /// Creates a repository with pre-populated records
    pub fn with_records(
        cache: Arc<dyn CacheStore>,
        strategies: Vec<StrategyConfig>,
        awards: Vec<StrategyAward>,
        rules: Vec<StrategyRule>,
    ) -> Self {
        Self {
            records: RwLock::new(StrategyRecords {
                strategies,
                awards,
                rules,
            }),
            rate_tables: RateTableCache::new(cache),
        }
    }

    pub fn from_seed(cache: Arc<dyn CacheStore>, seed: SeedData) -> Self {
        Self::with_records(cache, seed.strategies, seed.awards, seed.rules)
    }

    /// Replaces every award of `strategy_id`, as an operator editing rates would
    pub async fn replace_awards(&self, strategy_id: i64, awards: Vec<StrategyAward>) {
        let mut records = self.records.write().await;
        records.awards.retain(|a| a.strategy_id != strategy_id);
        records.awards.extend(awards);
    }
}

#[async_trait]
impl StrategyRepository for InMemoryStrategyRepository {
    #[instrument(skip(self))]
    async fn query_strategy_award_list(
        &self,
        strategy_id: i64,
    ) -> Result<Vec<StrategyAward>, AppError> {
        let records = self.records.read().await;
        let awards: Vec<StrategyAward> = records
            .awards
            .iter()
            .filter(|a| a.strategy_id == strategy_id)
            .cloned()
            .collect();

        debug!(strategy_id, award_count = awards.len(), "Awards loaded from memory");
        Ok(awards)
    }

    async fn query_strategy(&self, strategy_id: i64) -> Result<Option<StrategyConfig>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .strategies
            .iter()
            .find(|s| s.strategy_id == strategy_id)
            .cloned())
    }

    async fn query_strategy_rule(
        &self,
        strategy_id: i64,
        rule_model: RuleModel,
    ) -> Result<Option<StrategyRule>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .rules
            .iter()
            .find(|r| r.strategy_id == strategy_id && r.rule_model == rule_model.as_ref())
            .cloned())
    }

    async fn query_strategy_rule_value(
        &self,
        strategy_id: i64,
        award_id: Option<i64>,
        rule_model: RuleModel,
    ) -> Result<Option<String>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .rules
            .iter()
            .find(|r| {
                r.strategy_id == strategy_id
                    && r.rule_model == rule_model.as_ref()
                    && award_id.map_or(true, |id| r.award_id == Some(id))
            })
            .map(|r| r.rule_value.clone()))
    }

    async fn query_strategy_award_rule_models(
        &self,
        strategy_id: i64,
        award_id: i64,
    ) -> Result<Option<String>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .awards
            .iter()
            .find(|a| a.strategy_id == strategy_id && a.award_id == award_id)
            .and_then(|a| a.rule_models.clone()))
    }

    async fn store_rate_table(&self, key: &str, table: &RateTable) -> Result<(), AppError> {
        self.rate_tables.store_rate_table(key, &table.entries).await
    }

    async fn get_rate_range(&self, key: &str) -> Result<u32, AppError> {
        self.rate_tables.get_rate_range(key).await
    }

    async fn get_strategy_award_assemble(&self, key: &str, index: u32) -> Result<i64, AppError> {
        self.rate_tables.get_award(key, index).await
    }
}

/// PostgreSQL implementation of the strategy repository
///
/// Award lists are served cache-first and written back after a database read.
pub struct PostgresStrategyRepository {
    pool: PgPool,
    rate_tables: RateTableCache,
}

impl PostgresStrategyRepository {
    pub fn new(pool: PgPool, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            pool,
            rate_tables: RateTableCache::new(cache),
        }
    }
}

#[async_trait]
impl StrategyRepository for PostgresStrategyRepository {
    #[instrument(skip(self))]
    async fn query_strategy_award_list(
        &self,
        strategy_id: i64,
    ) -> Result<Vec<StrategyAward>, AppError> {
        if let Some(cached) = self.rate_tables.cached_award_list(strategy_id).await? {
            if !cached.is_empty() {
                debug!(strategy_id, "Awards served from cache");
                return Ok(cached);
            }
        }

        let awards = sqlx::query_as::<_, StrategyAward>(
            "SELECT strategy_id, award_id, award_count, award_count_surplus, award_rate, rule_models \
             FROM strategy_award WHERE strategy_id = $1 ORDER BY sort",
        )
        .bind(strategy_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, strategy_id, "Failed to query strategy awards");
            AppError::from(e)
        })?;

        self.rate_tables.store_award_list(strategy_id, &awards).await?;

        debug!(strategy_id, award_count = awards.len(), "Awards loaded from database");
        Ok(awards)
    }

    #[instrument(skip(self))]
    async fn query_strategy(&self, strategy_id: i64) -> Result<Option<StrategyConfig>, AppError> {
        sqlx::query_as::<_, StrategyConfig>(
            "SELECT strategy_id, strategy_desc, rule_models FROM strategy WHERE strategy_id = $1",
        )
        .bind(strategy_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, strategy_id, "Failed to query strategy");
            AppError::from(e)
        })
    }

    #[instrument(skip(self))]
    async fn query_strategy_rule(
        &self,
        strategy_id: i64,
        rule_model: RuleModel,
    ) -> Result<Option<StrategyRule>, AppError> {
        sqlx::query_as::<_, StrategyRule>(
            "SELECT strategy_id, award_id, rule_type, rule_model, rule_value, rule_desc \
             FROM strategy_rule WHERE strategy_id = $1 AND rule_model = $2",
        )
        .bind(strategy_id)
        .bind(rule_model.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, strategy_id, %rule_model, "Failed to query strategy rule");
            AppError::from(e)
        })
    }

    #[instrument(skip(self))]
    async fn query_strategy_rule_value(
        &self,
        strategy_id: i64,
        award_id: Option<i64>,
        rule_model: RuleModel,
    ) -> Result<Option<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            "SELECT rule_value FROM strategy_rule \
             WHERE strategy_id = $1 AND rule_model = $2 AND ($3::BIGINT IS NULL OR award_id = $3) \
             LIMIT 1",
        )
        .bind(strategy_id)
        .bind(rule_model.as_ref())
        .bind(award_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, strategy_id, %rule_model, "Failed to query strategy rule value");
            AppError::from(e)
        })
    }

    #[instrument(skip(self))]
    async fn query_strategy_award_rule_models(
        &self,
        strategy_id: i64,
        award_id: i64,
    ) -> Result<Option<String>, AppError> {
        let row = sqlx::query_scalar::<_, Option<String>>(
            "SELECT rule_models FROM strategy_award WHERE strategy_id = $1 AND award_id = $2",
        )
        .bind(strategy_id)
        .bind(award_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, strategy_id, award_id, "Failed to query award rule models");
            AppError::from(e)
        })?;

        Ok(row.flatten())
    }

    async fn store_rate_table(&self, key: &str, table: &RateTable) -> Result<(), AppError> {
        self.rate_tables.store_rate_table(key, &table.entries).await
    }

    async fn get_rate_range(&self, key: &str) -> Result<u32, AppError> {
        self.rate_tables.get_rate_range(key).await
    }

    async fn get_strategy_award_assemble(&self, key: &str, index: u32) -> Result<i64, AppError> {
        self.rate_tables.get_award(key, index).await
    }
}
