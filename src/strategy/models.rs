use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::shared::AppError;

/// An award of a strategy together with its winning probability
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct StrategyAward {
    pub strategy_id: i64,
    pub award_id: i64,
    pub award_count: i32,
    pub award_count_surplus: i32,
    pub award_rate: Decimal,
    /// Comma separated rule models bound to this award, e.g. `rule_lock,rule_luck_award`
    #[serde(default)]
    pub rule_models: Option<String>,
}

/// Database model for the strategy table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy_id: i64,
    pub strategy_desc: String,
    #[serde(default)]
    pub rule_models: Option<String>,
}

impl StrategyConfig {
    /// Declared rule model names in declaration order
    pub fn rule_models(&self) -> Vec<&str> {
        split_rule_models(self.rule_models.as_deref())
    }

    pub fn has_rule_model(&self, name: &str) -> bool {
        self.rule_models().contains(&name)
    }
}

/// Database model for the strategy_rule table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct StrategyRule {
    pub strategy_id: i64,
    pub award_id: Option<i64>,
    /// 1 = award level rule, 2 = strategy level rule
    pub rule_type: i32,
    pub rule_model: String,
    pub rule_value: String,
    #[serde(default)]
    pub rule_desc: String,
}

impl StrategyRule {
    pub fn rule_weight_values(&self) -> Result<Vec<RuleWeightGroup>, AppError> {
        parse_rule_weight_value(&self.rule_value)
    }
}

/// One tier of a weight rule: users scoring at least `threshold` draw from `award_ids`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleWeightGroup {
    /// Threshold token as written, e.g. `4000`; suffix of the tier table key
    pub tier_key: String,
    pub threshold: i64,
    pub award_ids: Vec<i64>,
}

/// Parses `"4000:102,103 5000:102,103,104"` into weight groups
pub fn parse_rule_weight_value(value: &str) -> Result<Vec<RuleWeightGroup>, AppError> {
    value
        .split_whitespace()
        .map(|group| {
            let (tier, awards) = group.split_once(':').ok_or_else(|| {
                AppError::InvalidRuleValue(format!("weight group '{}' lacks ':'", group))
            })?;

            let threshold = tier.parse::<i64>().map_err(|_| {
                AppError::InvalidRuleValue(format!("weight threshold '{}' is not an integer", tier))
            })?;

            let award_ids = awards
                .split(',')
                .filter(|id| !id.is_empty())
                .map(|id| {
                    id.parse::<i64>().map_err(|_| {
                        AppError::InvalidRuleValue(format!("award id '{}' is not an integer", id))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            Ok(RuleWeightGroup {
                tier_key: tier.to_string(),
                threshold,
                award_ids,
            })
        })
        .collect()
}

pub(crate) fn split_rule_models(raw: Option<&str>) -> Vec<&str> {
    raw.map(|models| {
        models
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Shuffled lookup table produced by the armory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTable {
    /// `ceil(totalRate / minRate)`
    pub computed_range: u64,
    /// Index -> award id; may be longer than `computed_range` because of per-award ceiling
    pub entries: Vec<i64>,
}

impl RateTable {
    pub fn empty() -> Self {
        Self {
            computed_range: 0,
            entries: Vec::new(),
        }
    }

    /// Range published alongside the table; always the table length
    pub fn stored_range(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn slots_for(&self, award_id: i64) -> usize {
        self.entries.iter().filter(|id| **id == award_id).count()
    }
}

/// Input of a raffle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaffleFactor {
    pub user_id: String,
    pub strategy_id: Option<i64>,
}

impl RaffleFactor {
    pub fn new(user_id: impl Into<String>, strategy_id: i64) -> Self {
        Self {
            user_id: user_id.into(),
            strategy_id: Some(strategy_id),
        }
    }
}

/// Outcome of a raffle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaffleResult {
    pub award_id: Option<i64>,
    pub award_desc: Option<String>,
}

impl RaffleResult {
    pub fn award(award_id: i64) -> Self {
        Self {
            award_id: Some(award_id),
            award_desc: None,
        }
    }

    pub fn fallback(desc: impl Into<String>) -> Self {
        Self {
            award_id: None,
            award_desc: Some(desc.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_weight_groups_in_declaration_order() {
        let groups =
            parse_rule_weight_value("4000:102,103,104,105 5000:102,103,104,105,106,107").unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].tier_key, "4000");
        assert_eq!(groups[0].threshold, 4000);
        assert_eq!(groups[0].award_ids, vec![102, 103, 104, 105]);
        assert_eq!(groups[1].award_ids.len(), 6);
    }

    #[rstest]
    #[case("4000")]
    #[case("abc:101")]
    #[case("4000:101,x")]
    fn rejects_malformed_weight_values(#[case] raw: &str) {
        let err = parse_rule_weight_value(raw).unwrap_err();
        assert!(matches!(err, AppError::InvalidRuleValue(_)));
    }

    #[rstest]
    #[case(Some("rule_weight,rule_blacklist"), vec!["rule_weight", "rule_blacklist"])]
    #[case(Some(" rule_lock , "), vec!["rule_lock"])]
    #[case(Some(""), vec![])]
    #[case(None, vec![])]
    fn splits_rule_models(#[case] raw: Option<&str>, #[case] expected: Vec<&str>) {
        assert_eq!(split_rule_models(raw), expected);
    }

    #[test]
    fn strategy_config_reports_declared_models() {
        let config = StrategyConfig {
            strategy_id: 1,
            strategy_desc: "test".into(),
            rule_models: Some("rule_weight,rule_blacklist".into()),
        };
        assert!(config.has_rule_model("rule_weight"));
        assert!(!config.has_rule_model("rule_lock"));
    }

    #[test]
    fn raffle_factor_deserializes_without_strategy() {
        let factor: RaffleFactor = serde_json::from_str(r#"{"user_id":"u1"}"#).unwrap();
        assert_eq!(factor.user_id, "u1");
        assert!(factor.strategy_id.is_none());
    }
}
