use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{LogicFilter, RuleAction, RuleMatter, RuleModel, RulePayload};
use crate::shared::AppError;
use crate::strategy::repository::StrategyRepository;

/// Sends blacklisted users straight to a fixed award, bypassing the draw
pub struct RuleBlacklistLogicFilter {
    repository: Arc<dyn StrategyRepository>,
}

impl RuleBlacklistLogicFilter {
    pub fn new(repository: Arc<dyn StrategyRepository>) -> Self {
        Self { repository }
    }
}

/// Splits `"<fallbackAwardId>:<user1,user2,...>"`
fn parse_blacklist_value(value: &str) -> Result<(i64, Vec<&str>), AppError> {
    let (award, users) = value.split_once(':').ok_or_else(|| {
        AppError::InvalidRuleValue(format!("blacklist value '{}' lacks ':'", value))
    })?;

    let award_id = award.trim().parse::<i64>().map_err(|_| {
        AppError::InvalidRuleValue(format!("blacklist award '{}' is not an integer", award))
    })?;

    let users = users
        .split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .collect();

    Ok((award_id, users))
}

#[async_trait]
impl LogicFilter for RuleBlacklistLogicFilter {
    fn rule_model(&self) -> RuleModel {
        RuleModel::Blacklist
    }

    #[instrument(skip(self))]
    async fn filter(&self, matter: &RuleMatter) -> Result<RuleAction, AppError> {
        let value = self
            .repository
            .query_strategy_rule_value(matter.strategy_id, matter.award_id, RuleModel::Blacklist)
            .await?
            .ok_or_else(|| {
                AppError::RuleConfigMissing(format!(
                    "strategy {} has no rule_blacklist value",
                    matter.strategy_id
                ))
            })?;

        let (award_id, users) = parse_blacklist_value(&value)?;

        if users.contains(&matter.user_id.as_str()) {
            warn!(user_id = %matter.user_id, award_id, "Blacklisted user, fixed award");
            return Ok(RuleAction::take_over(
                RuleModel::Blacklist,
                RulePayload::FixedAward(award_id),
            ));
        }

        debug!(user_id = %matter.user_id, "User not blacklisted");
        Ok(RuleAction::allow())
    }
}
