use std::sync::Arc;
use thiserror::Error;

use crate::strategy::{
    activity::RaffleActivity,
    armory::StrategyArmory,
    dispatch::{DefaultStrategyDispatch, StrategyDispatch},
    raffle::DefaultRaffleStrategy,
    repository::StrategyRepository,
    rule::LogicFilterRegistry,
};

/// Shared engine state containing all wired collaborators
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn StrategyRepository>,
    pub armory: Arc<StrategyArmory>,
    pub dispatch: Arc<dyn StrategyDispatch>,
    pub raffle: Arc<DefaultRaffleStrategy>,
}

impl AppState {
    /// Wires the armory, dispatcher, filter registry and orchestrator over one repository
    pub fn new(
        repository: Arc<dyn StrategyRepository>,
        activity: Arc<dyn RaffleActivity>,
    ) -> Self {
        let armory = Arc::new(StrategyArmory::new(repository.clone()));
        let dispatch: Arc<dyn StrategyDispatch> =
            Arc::new(DefaultStrategyDispatch::new(repository.clone()));
        let registry = LogicFilterRegistry::builder(repository.clone(), activity).build();
        let raffle = Arc::new(DefaultRaffleStrategy::new(
            repository.clone(),
            dispatch.clone(),
            registry,
        ));

        Self {
            repository,
            armory,
            dispatch,
            raffle,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Illegal parameter: {0}")]
    IllegalParameter(String),

    #[error("Rule config missing: {0}")]
    RuleConfigMissing(String),

    #[error("Invalid rule value: {0}")]
    InvalidRuleValue(String),

    #[error("Rate range not found: {0}")]
    RangeNotFound(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Stable error code reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            AppError::IllegalParameter(_) => "ILLEGAL_PARAMETER",
            AppError::RuleConfigMissing(_) => "RULE_CONFIG_MISSING",
            AppError::InvalidRuleValue(_) => "INVALID_RULE_VALUE",
            AppError::RangeNotFound(_) => "RANGE_NOT_FOUND",
            AppError::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}
