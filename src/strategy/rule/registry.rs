use std::collections::HashMap;
use std::sync::Arc;

use super::{
    LogicFilter, RuleBlacklistLogicFilter, RuleLockLogicFilter, RuleModel, RuleWeightLogicFilter,
};
use crate::strategy::activity::RaffleActivity;
use crate::strategy::repository::StrategyRepository;

/// Rule model -> filter table, fixed once built
pub struct LogicFilterRegistry {
    filters: HashMap<RuleModel, Arc<dyn LogicFilter>>,
}

impl LogicFilterRegistry {
    pub fn builder(
        repository: Arc<dyn StrategyRepository>,
        activity: Arc<dyn RaffleActivity>,
    ) -> LogicFilterRegistryBuilder {
        LogicFilterRegistryBuilder::new(repository, activity)
    }

    pub fn get(&self, rule_model: RuleModel) -> Option<Arc<dyn LogicFilter>> {
        self.filters.get(&rule_model).cloned()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

pub struct LogicFilterRegistryBuilder {
    filters: Vec<Arc<dyn LogicFilter>>,
}

impl LogicFilterRegistryBuilder {
    fn new(repository: Arc<dyn StrategyRepository>, activity: Arc<dyn RaffleActivity>) -> Self {
        Self {
            filters: vec![
                Arc::new(RuleBlacklistLogicFilter::new(repository.clone())),
                Arc::new(RuleWeightLogicFilter::new(
                    repository.clone(),
                    activity.clone(),
                )),
                Arc::new(RuleLockLogicFilter::new(repository, activity)),
            ],
        }
    }

    /// Registers `filter`, replacing any filter already bound to its rule model
    pub fn with_filter(mut self, filter: Arc<dyn LogicFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn build(self) -> LogicFilterRegistry {
        // Later registrations win
        let filters = self
            .filters
            .into_iter()
            .map(|f| (f.rule_model(), f))
            .collect();

        LogicFilterRegistry { filters }
    }
}
