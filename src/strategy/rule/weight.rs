use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{LogicFilter, RuleAction, RuleMatter, RuleModel, RulePayload};
use crate::shared::AppError;
use crate::strategy::activity::RaffleActivity;
use crate::strategy::models::{parse_rule_weight_value, RuleWeightGroup};
use crate::strategy::repository::StrategyRepository;

/// Routes users with enough score to the matching tier table
pub struct RuleWeightLogicFilter {
    repository: Arc<dyn StrategyRepository>,
    activity: Arc<dyn RaffleActivity>,
}

impl RuleWeightLogicFilter {
    pub fn new(repository: Arc<dyn StrategyRepository>, activity: Arc<dyn RaffleActivity>) -> Self {
        Self {
            repository,
            activity,
        }
    }
}

/// Highest tier whose threshold the score reaches
fn select_tier(groups: &[RuleWeightGroup], score: i64) -> Option<&RuleWeightGroup> {
    groups
        .iter()
        .filter(|g| g.threshold <= score)
        .max_by_key(|g| g.threshold)
}

#[async_trait]
impl LogicFilter for RuleWeightLogicFilter {
    fn rule_model(&self) -> RuleModel {
        RuleModel::Weight
    }

    #[instrument(skip(self))]
    async fn filter(&self, matter: &RuleMatter) -> Result<RuleAction, AppError> {
        let value = self
            .repository
            .query_strategy_rule_value(matter.strategy_id, None, RuleModel::Weight)
            .await?
            .ok_or_else(|| {
                AppError::RuleConfigMissing(format!(
                    "strategy {} has no rule_weight value",
                    matter.strategy_id
                ))
            })?;

        let groups = parse_rule_weight_value(&value)?;
        let score = self
            .activity
            .user_score(&matter.user_id, matter.strategy_id)
            .await?;

        match select_tier(&groups, score) {
            Some(group) => {
                debug!(score, tier_key = %group.tier_key, "Weight tier selected");
                Ok(RuleAction::take_over(
                    RuleModel::Weight,
                    RulePayload::WeightKey(group.tier_key.clone()),
                ))
            }
            None => {
                debug!(score, "Score below every weight tier");
                Ok(RuleAction::allow())
            }
        }
    }
}
