use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::dispatch::StrategyDispatch;
use super::models::{split_rule_models, RaffleFactor, RaffleResult, StrategyConfig};
use super::repository::StrategyRepository;
use super::rule::{LogicFilterRegistry, RuleAction, RuleMatter, RuleModel, RulePayload, RulePhase};
use crate::shared::AppError;

#[async_trait]
pub trait RaffleStrategy: Send + Sync {
    async fn perform_raffle(&self, factor: &RaffleFactor) -> Result<RaffleResult, AppError>;
}

/// Runs before rules, the draw and center rules in sequence
///
/// A before-phase take-over ends the raffle: a blacklist hands back its fixed
/// award and a weight tier is drawn from its own table without center rules.
/// Otherwise the base table is drawn and the drawn award's center rules decide
/// whether it is granted or replaced by a description-only fallback.
pub struct DefaultRaffleStrategy {
    repository: Arc<dyn StrategyRepository>,
    dispatch: Arc<dyn StrategyDispatch>,
    registry: LogicFilterRegistry,
}

impl DefaultRaffleStrategy {
    pub fn new(
        repository: Arc<dyn StrategyRepository>,
        dispatch: Arc<dyn StrategyDispatch>,
        registry: LogicFilterRegistry,
    ) -> Self {
        Self {
            repository,
            dispatch,
            registry,
        }
    }

    /// Runs `models` in order and returns the first take-over, or allow
    async fn run_chain(
        &self,
        models: &[RuleModel],
        user_id: &str,
        strategy_id: i64,
        award_id: Option<i64>,
    ) -> Result<RuleAction, AppError> {
        for &rule_model in models {
            let Some(filter) = self.registry.get(rule_model) else {
                warn!(%rule_model, "No filter registered, rule skipped");
                continue;
            };

            let matter = RuleMatter {
                user_id: user_id.to_string(),
                strategy_id,
                award_id,
            };

            let action = filter.filter(&matter).await?;
            if action.is_take_over() {
                return Ok(action);
            }
        }

        Ok(RuleAction::allow())
    }
}

/// Before-phase models of a strategy, blacklist first then declaration order
fn before_phase_models(strategy: &StrategyConfig) -> Result<Vec<RuleModel>, AppError> {
    let mut models = phase_models(&strategy.rule_models(), RulePhase::Before)?;
    models.sort_by_key(|m| *m != RuleModel::Blacklist);
    Ok(models)
}

fn phase_models(names: &[&str], phase: RulePhase) -> Result<Vec<RuleModel>, AppError> {
    let mut models = Vec::new();
    for name in names {
        let model = RuleModel::from_name(name)?;
        if model.phase() == phase {
            models.push(model);
        }
    }
    Ok(models)
}

#[async_trait]
impl RaffleStrategy for DefaultRaffleStrategy {
    #[instrument(skip(self))]
    async fn perform_raffle(&self, factor: &RaffleFactor) -> Result<RaffleResult, AppError> {
        let user_id = factor.user_id.as_str();
        if user_id.trim().is_empty() {
            return Err(AppError::IllegalParameter("user id is blank".to_string()));
        }
        let strategy_id = factor
            .strategy_id
            .ok_or_else(|| AppError::IllegalParameter("strategy id is absent".to_string()))?;

        let strategy = self
            .repository
            .query_strategy(strategy_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("strategy {}", strategy_id)))?;

        let before_models = before_phase_models(&strategy)?;
        let before = self
            .run_chain(&before_models, user_id, strategy_id, None)
            .await?;

        if before.is_take_over() {
            let rule_model = before.rule_model;
            match before.payload {
                RulePayload::FixedAward(award_id) => {
                    info!(user_id, strategy_id, award_id, ?rule_model, "Raffle taken over");
                    return Ok(RaffleResult::award(award_id));
                }
                RulePayload::WeightKey(tier_key) => {
                    let award_id = self.dispatch.draw(strategy_id, Some(&tier_key)).await?;
                    info!(user_id, strategy_id, award_id, %tier_key, "Raffle drawn from weight tier");
                    return Ok(RaffleResult::award(award_id));
                }
                RulePayload::None => {
                    warn!(user_id, strategy_id, ?rule_model, "Raffle blocked before draw");
                    return Ok(RaffleResult::fallback(before.info));
                }
            }
        }

        let award_id = self.dispatch.draw(strategy_id, None).await?;

        let award_models = self
            .repository
            .query_strategy_award_rule_models(strategy_id, award_id)
            .await?;
        let center_models = phase_models(
            &split_rule_models(award_models.as_deref()),
            RulePhase::Center,
        )?;

        let center = self
            .run_chain(&center_models, user_id, strategy_id, Some(award_id))
            .await?;

        if center.is_take_over() {
            warn!(user_id, strategy_id, award_id, "Drawn award withheld by center rule");
            let desc = match center.rule_model {
                Some(model) => format!("award {} withheld by {}: {}", award_id, model, center.info),
                None => center.info,
            };
            return Ok(RaffleResult::fallback(desc));
        }

        debug!(user_id, strategy_id, award_id, "Raffle completed");
        Ok(RaffleResult::award(award_id))
    }
}
