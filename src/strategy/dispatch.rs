use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::repository::StrategyRepository;
use crate::cache::strategy_key;
use crate::shared::AppError;

/// Picks an award from an assembled lookup table
#[async_trait]
pub trait StrategyDispatch: Send + Sync {
    /// Draws from the base table, or from the tier table when `tier_key` is given
    async fn draw(&self, strategy_id: i64, tier_key: Option<&str>) -> Result<i64, AppError>;
}

/// Uniform random index into the published table, read-only
pub struct DefaultStrategyDispatch {
    repository: Arc<dyn StrategyRepository>,
}

impl DefaultStrategyDispatch {
    pub fn new(repository: Arc<dyn StrategyRepository>) -> Self {
        Self { repository }
    }
}

/// Range re-reads allowed when a rebuild shrinks the table mid-draw
const MAX_RANGE_REFRESHES: usize = 3;

#[async_trait]
impl StrategyDispatch for DefaultStrategyDispatch {
    #[instrument(skip(self))]
    async fn draw(&self, strategy_id: i64, tier_key: Option<&str>) -> Result<i64, AppError> {
        let key = strategy_key(strategy_id, tier_key);
        let mut rate_range = self.repository.get_rate_range(&key).await?;
        let mut refreshes = 0;

        loop {
            if rate_range == 0 {
                return Err(AppError::RangeNotFound(format!(
                    "no awards assembled for key {}",
                    key
                )));
            }

            let index = rand::rng().random_range(0..rate_range);
            match self
                .repository
                .get_strategy_award_assemble(&key, index)
                .await
            {
                Ok(award_id) => {
                    debug!(%key, index, award_id, "Award drawn");
                    return Ok(award_id);
                }
                Err(AppError::RangeNotFound(_)) if refreshes < MAX_RANGE_REFRESHES => {
                    // A concurrent rebuild trimmed the index; the range may have
                    // flipped back since, so retry against whatever is published now
                    let current = self.repository.get_rate_range(&key).await?;
                    debug!(%key, stale = rate_range, current, "Index missing, range re-read");
                    rate_range = current;
                    refreshes += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
