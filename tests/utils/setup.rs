use std::sync::Arc;

use bigmarket::{
    AppState, CacheStore, InMemoryCacheStore, InMemoryRaffleActivity, InMemoryStrategyRepository,
    SeedData,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// Weighted strategy with blacklist, tiers and locked awards in the bundled seed
pub const RULED_STRATEGY: i64 = 100001;
/// Strategy without rules in the bundled seed
pub const PLAIN_STRATEGY: i64 = 100002;

#[allow(dead_code)]
pub struct TestSetup {
    pub cache: Arc<dyn CacheStore>,
    pub repository: Arc<InMemoryStrategyRepository>,
    pub activity: Arc<InMemoryRaffleActivity>,
    pub state: AppState,
}

pub struct TestSetupBuilder {
    seed: SeedData,
    cache: Option<Arc<dyn CacheStore>>,
}

impl TestSetupBuilder {
    /// Starts from the seed file shipped with the crate
    pub fn new() -> Self {
        let seed = SeedData::from_file(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/strategy_seed.json"
        ))
        .unwrap();

        Self { seed, cache: None }
    }

    #[allow(dead_code)]
    pub fn with_seed_json(mut self, json: &str) -> Self {
        self.seed = SeedData::from_json(json).unwrap();
        self
    }

    /// Shares `cache` with the built engine, as a second process would
    #[allow(dead_code)]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> TestSetup {
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(InMemoryCacheStore::new()) as Arc<dyn CacheStore>);
        let repository = Arc::new(InMemoryStrategyRepository::from_seed(
            cache.clone(),
            self.seed,
        ));
        let activity = Arc::new(InMemoryRaffleActivity::new());
        let state = AppState::new(repository.clone(), activity.clone());

        TestSetup {
            cache,
            repository,
            activity,
            state,
        }
    }

    /// Builds and assembles every strategy of the seed
    pub async fn build_assembled(self) -> TestSetup {
        let strategy_ids = self.seed.strategy_ids();
        let setup = self.build();

        for strategy_id in strategy_ids {
            setup
                .state
                .armory
                .assemble_lottery_strategy(strategy_id)
                .await
                .unwrap();
        }

        setup
    }
}
