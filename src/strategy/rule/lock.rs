use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{LogicFilter, RuleAction, RuleMatter, RuleModel, RulePayload};
use crate::shared::AppError;
use crate::strategy::activity::RaffleActivity;
use crate::strategy::repository::StrategyRepository;

/// Keeps an award locked until the user has played the configured number of times
pub struct RuleLockLogicFilter {
    repository: Arc<dyn StrategyRepository>,
    activity: Arc<dyn RaffleActivity>,
}

impl RuleLockLogicFilter {
    pub fn new(repository: Arc<dyn StrategyRepository>, activity: Arc<dyn RaffleActivity>) -> Self {
        Self {
            repository,
            activity,
        }
    }
}

#[async_trait]
impl LogicFilter for RuleLockLogicFilter {
    fn rule_model(&self) -> RuleModel {
        RuleModel::Lock
    }

    #[instrument(skip(self))]
    async fn filter(&self, matter: &RuleMatter) -> Result<RuleAction, AppError> {
        let award_id = matter.award_id.ok_or_else(|| {
            AppError::IllegalParameter("rule_lock needs the drawn award id".to_string())
        })?;

        let value = self
            .repository
            .query_strategy_rule_value(matter.strategy_id, Some(award_id), RuleModel::Lock)
            .await?
            .ok_or_else(|| {
                AppError::RuleConfigMissing(format!(
                    "award {} of strategy {} has no rule_lock value",
                    award_id, matter.strategy_id
                ))
            })?;

        let threshold = value.trim().parse::<i64>().map_err(|_| {
            AppError::InvalidRuleValue(format!("lock threshold '{}' is not an integer", value))
        })?;

        let raffle_count = self
            .activity
            .user_raffle_count(&matter.user_id, matter.strategy_id, award_id)
            .await?;

        if raffle_count >= threshold {
            debug!(raffle_count, threshold, "Award unlocked");
            return Ok(RuleAction::allow());
        }

        warn!(raffle_count, threshold, award_id, "Award still locked");
        Ok(RuleAction::take_over(RuleModel::Lock, RulePayload::None))
    }
}
