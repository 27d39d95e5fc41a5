pub mod blacklist;
pub mod lock;
pub mod registry;
pub mod weight;

pub use blacklist::RuleBlacklistLogicFilter;
pub use lock::RuleLockLogicFilter;
pub use registry::{LogicFilterRegistry, LogicFilterRegistryBuilder};
pub use weight::RuleWeightLogicFilter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::shared::AppError;

/// When a rule runs relative to the random draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RulePhase {
    Before,
    Center,
    After,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    AsRefStr,
    Display,
)]
pub enum RuleModel {
    /// Draw from the tier table matching the user's score
    #[strum(serialize = "rule_weight")]
    #[serde(rename = "rule_weight")]
    Weight,
    /// Blacklisted users get a fixed award
    #[strum(serialize = "rule_blacklist")]
    #[serde(rename = "rule_blacklist")]
    Blacklist,
    /// Award unlocks after the user has played N times
    #[strum(serialize = "rule_lock")]
    #[serde(rename = "rule_lock")]
    Lock,
    /// Consolation award once the draw is settled
    #[strum(serialize = "rule_luck_award")]
    #[serde(rename = "rule_luck_award")]
    LuckAward,
}

impl RuleModel {
    pub fn phase(self) -> RulePhase {
        match self {
            RuleModel::Weight | RuleModel::Blacklist => RulePhase::Before,
            RuleModel::Lock => RulePhase::Center,
            RuleModel::LuckAward => RulePhase::After,
        }
    }

    /// Resolves a configured name, failing for names no rule model answers to
    pub fn from_name(name: &str) -> Result<Self, AppError> {
        name.parse::<RuleModel>()
            .map_err(|_| AppError::RuleConfigMissing(format!("unknown rule model '{}'", name)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleLogicCheckType {
    /// Continue with the default flow
    Allow,
    /// The rule decides the outcome
    TakeOver,
}

impl RuleLogicCheckType {
    pub fn code(self) -> &'static str {
        match self {
            RuleLogicCheckType::Allow => "0000",
            RuleLogicCheckType::TakeOver => "0001",
        }
    }

    pub fn info(self) -> &'static str {
        match self {
            RuleLogicCheckType::Allow => "rule passed, continue with default flow",
            RuleLogicCheckType::TakeOver => "rule took over the flow",
        }
    }
}

/// Data a take-over hands back to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RulePayload {
    None,
    FixedAward(i64),
    WeightKey(String),
}

/// Verdict of a logic filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    pub check: RuleLogicCheckType,
    pub info: String,
    pub rule_model: Option<RuleModel>,
    pub payload: RulePayload,
}

impl RuleAction {
    pub fn allow() -> Self {
        Self {
            check: RuleLogicCheckType::Allow,
            info: RuleLogicCheckType::Allow.info().to_string(),
            rule_model: None,
            payload: RulePayload::None,
        }
    }

    pub fn take_over(rule_model: RuleModel, payload: RulePayload) -> Self {
        Self {
            check: RuleLogicCheckType::TakeOver,
            info: RuleLogicCheckType::TakeOver.info().to_string(),
            rule_model: Some(rule_model),
            payload,
        }
    }

    pub fn is_take_over(&self) -> bool {
        self.check == RuleLogicCheckType::TakeOver
    }
}

/// Context threaded through a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatter {
    pub user_id: String,
    pub strategy_id: i64,
    pub award_id: Option<i64>,
}

/// A pluggable rule evaluated around the draw
#[async_trait]
pub trait LogicFilter: Send + Sync {
    fn rule_model(&self) -> RuleModel;

    fn phase(&self) -> RulePhase {
        self.rule_model().phase()
    }

    async fn filter(&self, matter: &RuleMatter) -> Result<RuleAction, AppError>;
}
