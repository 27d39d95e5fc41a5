use rand::seq::SliceRandom;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::models::{RateTable, StrategyAward};
use super::repository::StrategyRepository;
use super::rule::RuleModel;
use crate::cache::strategy_key;
use crate::shared::AppError;

/// Largest lookup table the armory will build for one key
pub const MAX_RATE_RANGE: u64 = 10_000_000;

/// Turns a strategy's award probabilities into shared lookup tables
pub struct StrategyArmory {
    repository: Arc<dyn StrategyRepository>,
}

impl StrategyArmory {
    pub fn new(repository: Arc<dyn StrategyRepository>) -> Self {
        Self { repository }
    }

    /// Builds the base table and, when the strategy declares `rule_weight`, one table per tier
    ///
    /// Each table is written independently, so a failure part way leaves earlier
    /// tables in place and the whole assembly can simply be re-run.
    #[instrument(skip(self))]
    pub async fn assemble_lottery_strategy(&self, strategy_id: i64) -> Result<(), AppError> {
        let awards = self
            .repository
            .query_strategy_award_list(strategy_id)
            .await?;
        self.assemble(&strategy_key(strategy_id, None), &awards)
            .await?;

        let Some(strategy) = self.repository.query_strategy(strategy_id).await? else {
            debug!(strategy_id, "No strategy record, only the base table was assembled");
            return Ok(());
        };

        if !strategy.has_rule_model(RuleModel::Weight.as_ref()) {
            return Ok(());
        }

        let rule = self
            .repository
            .query_strategy_rule(strategy_id, RuleModel::Weight)
            .await?
            .ok_or_else(|| {
                warn!(strategy_id, "Strategy declares rule_weight without a rule row");
                AppError::RuleConfigMissing(format!(
                    "strategy {} declares rule_weight but has no weight rule",
                    strategy_id
                ))
            })?;

        for group in rule.rule_weight_values()? {
            let tier_awards: Vec<StrategyAward> = awards
                .iter()
                .filter(|a| group.award_ids.contains(&a.award_id))
                .cloned()
                .collect();

            self.assemble(
                &strategy_key(strategy_id, Some(&group.tier_key)),
                &tier_awards,
            )
            .await?;
        }

        Ok(())
    }

    async fn assemble(&self, key: &str, awards: &[StrategyAward]) -> Result<RateTable, AppError> {
        let table = build_rate_table(awards)?;
        self.repository.store_rate_table(key, &table).await?;

        info!(
            key,
            computed_range = table.computed_range,
            stored_range = table.stored_range(),
            "Rate table assembled"
        );
        Ok(table)
    }
}

/// Builds a shuffled lookup table in memory
///
/// Every award gets `ceil(range * rate)` slots. Independent ceilings can make the
/// table up to `awards - 1` entries longer than the computed range; the table is
/// kept whole and its length is what gets published as the range.
pub fn build_rate_table(awards: &[StrategyAward]) -> Result<RateTable, AppError> {
    let positive: Vec<&StrategyAward> = awards
        .iter()
        .filter(|a| a.award_rate > Decimal::ZERO)
        .collect();

    if positive.len() < awards.len() {
        warn!(
            skipped = awards.len() - positive.len(),
            "Ignoring awards without a positive rate"
        );
    }

    let Some(min_rate) = positive.iter().map(|a| a.award_rate).min() else {
        return Ok(RateTable::empty());
    };
    let total_rate: Decimal = positive.iter().map(|a| a.award_rate).sum();

    let computed_range = ceil_div(total_rate, min_rate)?;
    if computed_range > MAX_RATE_RANGE {
        return Err(AppError::IllegalParameter(format!(
            "rate range {} exceeds {}",
            computed_range, MAX_RATE_RANGE
        )));
    }

    let mut entries = Vec::with_capacity(computed_range as usize + positive.len());
    for award in &positive {
        let slots = slot_count(computed_range, award.award_rate)?;
        entries.extend(std::iter::repeat(award.award_id).take(slots));
    }

    entries.shuffle(&mut rand::rng());

    Ok(RateTable {
        computed_range,
        entries,
    })
}

/// Exact `ceil(numerator / denominator)` for positive decimals
///
/// Both values are brought to a common scale and divided as integers; plain
/// decimal division rounds at 28 digits and can land on the wrong side of an integer.
fn ceil_div(numerator: Decimal, denominator: Decimal) -> Result<u64, AppError> {
    let scale = numerator.scale().max(denominator.scale());
    let n = rescaled_mantissa(numerator, scale)?;
    let d = rescaled_mantissa(denominator, scale)?;

    let quotient = n / d + i128::from(n % d != 0);
    u64::try_from(quotient)
        .map_err(|_| AppError::IllegalParameter(format!("rate range {} out of bounds", quotient)))
}

fn rescaled_mantissa(value: Decimal, scale: u32) -> Result<i128, AppError> {
    10i128
        .checked_pow(scale - value.scale())
        .and_then(|factor| value.mantissa().checked_mul(factor))
        .ok_or_else(|| AppError::IllegalParameter(format!("rate {} has too much precision", value)))
}

fn slot_count(rate_range: u64, rate: Decimal) -> Result<usize, AppError> {
    Decimal::from(rate_range)
        .checked_mul(rate)
        .and_then(|slots| slots.ceil().to_usize())
        .ok_or_else(|| {
            AppError::IllegalParameter(format!("slot count for rate {} overflows", rate))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::{award, rule, RepositoryBuilder, STRATEGY_ID};
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    fn awards(rates: &[(i64, &str)]) -> Vec<StrategyAward> {
        rates
            .iter()
            .map(|(id, rate)| award(STRATEGY_ID, *id, rate))
            .collect()
    }

    #[rstest]
    #[case(dec!(1.0), dec!(0.2), 5)]
    #[case(dec!(1), dec!(0.0001), 10000)]
    #[case(dec!(0.95), dec!(0.0001), 9500)]
    #[case(dec!(1), dec!(0.3), 4)]
    #[case(dec!(0.7), dec!(0.7), 1)]
    fn ceil_div_is_exact(#[case] total: Decimal, #[case] min: Decimal, #[case] expected: u64) {
        assert_eq!(ceil_div(total, min).unwrap(), expected);
    }

    #[test]
    fn keeps_over_allocated_slots_and_publishes_table_length() {
        let table = build_rate_table(&awards(&[(101, "0.5"), (102, "0.3"), (103, "0.2")])).unwrap();

        assert_eq!(table.computed_range, 5);
        assert_eq!(table.slots_for(101), 3);
        assert_eq!(table.slots_for(102), 2);
        assert_eq!(table.slots_for(103), 1);
        assert_eq!(table.entries.len(), 6);
        assert_eq!(table.stored_range(), 6);
    }

    #[test]
    fn slot_counts_stay_within_one_rounding_unit() {
        let list = awards(&[
            (101, "0.3"),
            (102, "0.2"),
            (103, "0.2"),
            (104, "0.1"),
            (105, "0.1"),
            (106, "0.05"),
            (107, "0.03"),
            (108, "0.015"),
            (109, "0.005"),
        ]);
        let table = build_rate_table(&list).unwrap();

        assert_eq!(table.computed_range, 200);
        for entry in &list {
            let exact = Decimal::from(table.computed_range) * entry.award_rate;
            let slots = Decimal::from(table.slots_for(entry.award_id) as u64);
            assert!(slots >= exact && slots - exact < Decimal::ONE);
        }
        assert!(table.stored_range() < table.computed_range as usize + list.len());
    }

    #[test]
    fn every_entry_is_a_configured_award() {
        let list = awards(&[(101, "0.0001"), (102, "0.9999")]);
        let table = build_rate_table(&list).unwrap();
        let ids: HashSet<i64> = list.iter().map(|a| a.award_id).collect();

        assert_eq!(table.computed_range, 10000);
        assert!(table.entries.iter().all(|id| ids.contains(id)));
        assert_eq!(table.slots_for(101), 1);
    }

    #[test]
    fn empty_award_list_builds_empty_table() {
        let table = build_rate_table(&[]).unwrap();
        assert_eq!(table, RateTable::empty());
        assert_eq!(table.stored_range(), 0);
    }

    #[test]
    fn zero_rate_awards_are_ignored() {
        let table = build_rate_table(&awards(&[(101, "0"), (102, "0.5")])).unwrap();
        assert_eq!(table.computed_range, 1);
        assert_eq!(table.entries, vec![102]);

        let all_zero = build_rate_table(&awards(&[(101, "0")])).unwrap();
        assert!(all_zero.is_empty());
    }

    #[test]
    fn oversized_range_is_rejected() {
        let err = build_rate_table(&awards(&[(101, "0.00000001"), (102, "0.99999999")]))
            .unwrap_err();
        assert_eq!(err.code(), "ILLEGAL_PARAMETER");
    }

    #[tokio::test]
    async fn assembles_base_and_tier_tables() {
        let repo = RepositoryBuilder::new()
            .with_strategy(STRATEGY_ID, "rule_weight")
            .with_award(award(STRATEGY_ID, 101, "0.5"))
            .with_award(award(STRATEGY_ID, 102, "0.3"))
            .with_award(award(STRATEGY_ID, 103, "0.2"))
            .with_rule(rule(STRATEGY_ID, None, "rule_weight", "4000:102,103 5000:103"))
            .build();
        let armory = StrategyArmory::new(repo.clone());

        armory.assemble_lottery_strategy(STRATEGY_ID).await.unwrap();

        assert_eq!(repo.get_rate_range("100001").await.unwrap(), 6);
        // range ceil(0.5 / 0.2) = 3, one slot each for 102 and 103
        assert_eq!(repo.get_rate_range("100001_4000").await.unwrap(), 2);
        assert_eq!(repo.get_rate_range("100001_5000").await.unwrap(), 1);
        assert_eq!(
            repo.get_strategy_award_assemble("100001_5000", 0)
                .await
                .unwrap(),
            103
        );
    }

    #[tokio::test]
    async fn tier_tables_are_keyed_by_threshold_only() {
        let repo = RepositoryBuilder::new()
            .with_strategy(STRATEGY_ID, "rule_weight")
            .with_award(award(STRATEGY_ID, 102, "0.5"))
            .with_award(award(STRATEGY_ID, 103, "0.5"))
            .with_rule(rule(STRATEGY_ID, None, "rule_weight", "4000:102,103"))
            .build();
        StrategyArmory::new(repo.clone())
            .assemble_lottery_strategy(STRATEGY_ID)
            .await
            .unwrap();

        assert_eq!(repo.get_rate_range("100001_4000").await.unwrap(), 2);
        let err = repo.get_rate_range("100001_4000:102,103").await.unwrap_err();
        assert_eq!(err.code(), "RANGE_NOT_FOUND");
    }

    #[tokio::test]
    async fn declared_weight_rule_without_config_fails() {
        let repo = RepositoryBuilder::new()
            .with_strategy(STRATEGY_ID, "rule_weight,rule_blacklist")
            .with_award(award(STRATEGY_ID, 101, "1"))
            .build();
        let armory = StrategyArmory::new(repo.clone());

        let err = armory
            .assemble_lottery_strategy(STRATEGY_ID)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RuleConfigMissing(_)));
        // The base table was already committed and stays usable
        assert_eq!(repo.get_rate_range("100001").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rebuild_replaces_published_range() {
        let repo = RepositoryBuilder::new().with_simple_strategy().build();
        let armory = StrategyArmory::new(repo.clone());
        armory.assemble_lottery_strategy(STRATEGY_ID).await.unwrap();
        assert_eq!(repo.get_rate_range("100001").await.unwrap(), 6);

        repo.replace_awards(
            STRATEGY_ID,
            awards(&[(201, "0.25"), (202, "0.25"), (203, "0.25"), (204, "0.25")]),
        )
        .await;
        armory.assemble_lottery_strategy(STRATEGY_ID).await.unwrap();

        assert_eq!(repo.get_rate_range("100001").await.unwrap(), 4);
        for index in 0..4 {
            let id = repo
                .get_strategy_award_assemble("100001", index)
                .await
                .unwrap();
            assert!((201..=204).contains(&id));
        }
    }
}
