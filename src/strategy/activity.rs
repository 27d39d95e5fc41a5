use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::shared::AppError;

/// User context owned by other services (points, play history)
#[async_trait]
pub trait RaffleActivity: Send + Sync {
    /// Score deciding which weight tier the user draws from
    async fn user_score(&self, user_id: &str, strategy_id: i64) -> Result<i64, AppError>;

    /// Draws the user has already made towards unlocking `award_id`
    async fn user_raffle_count(
        &self,
        user_id: &str,
        strategy_id: i64,
        award_id: i64,
    ) -> Result<i64, AppError>;
}

/// In-memory RaffleActivity; scores keyed by (user, strategy), raffle counts by
/// (user, strategy, award). Unknown users score and count 0
#[derive(Debug, Default)]
pub struct InMemoryRaffleActivity {
    scores: RwLock<HashMap<(String, i64), i64>>,
    raffle_counts: RwLock<HashMap<(String, i64, i64), i64>>,
}

impl InMemoryRaffleActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_score(&self, user_id: &str, strategy_id: i64, score: i64) {
        self.scores
            .write()
            .await
            .insert((user_id.to_string(), strategy_id), score);
    }

    pub async fn set_raffle_count(
        &self,
        user_id: &str,
        strategy_id: i64,
        award_id: i64,
        count: i64,
    ) {
        self.raffle_counts
            .write()
            .await
            .insert((user_id.to_string(), strategy_id, award_id), count);
    }
}

#[async_trait]
impl RaffleActivity for InMemoryRaffleActivity {
    async fn user_score(&self, user_id: &str, strategy_id: i64) -> Result<i64, AppError> {
        Ok(self
            .scores
            .read()
            .await
            .get(&(user_id.to_string(), strategy_id))
            .copied()
            .unwrap_or_default())
    }

    async fn user_raffle_count(
        &self,
        user_id: &str,
        strategy_id: i64,
        award_id: i64,
    ) -> Result<i64, AppError> {
        Ok(self
            .raffle_counts
            .read()
            .await
            .get(&(user_id.to_string(), strategy_id, award_id))
            .copied()
            .unwrap_or_default())
    }
}
