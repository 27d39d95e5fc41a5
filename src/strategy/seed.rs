use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::models::{StrategyAward, StrategyConfig, StrategyRule};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Strategy, award and rule records loaded from a JSON fixture
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub awards: Vec<StrategyAward>,
    #[serde(default)]
    pub rules: Vec<StrategyRule>,
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn strategy_ids(&self) -> Vec<i64> {
        self.strategies.iter().map(|s| s.strategy_id).collect()
    }
}
