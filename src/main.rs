use bigmarket::{
    strategy::PostgresStrategyRepository, AppState, CacheStore, Config, InMemoryCacheStore,
    InMemoryRaffleActivity, InMemoryStrategyRepository, RaffleFactor, RaffleStrategy, SeedData,
    StrategyRepository,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bigmarket=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(?config, "Starting big market raffle engine");

    let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());

    let repository: Arc<dyn StrategyRepository> = match &config.database.url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(url)
                .await?;
            info!("Using PostgreSQL strategy repository");
            Arc::new(PostgresStrategyRepository::new(pool, cache))
        }
        None => {
            let seed = SeedData::from_file(&config.raffle.seed_path)?;
            info!(path = %config.raffle.seed_path, "Using seeded in-memory strategy repository");
            Arc::new(InMemoryStrategyRepository::from_seed(cache, seed))
        }
    };

    let activity = Arc::new(InMemoryRaffleActivity::new());
    let app_state = AppState::new(repository, activity);

    futures::future::try_join_all(
        config
            .raffle
            .strategy_ids
            .iter()
            .map(|id| app_state.armory.assemble_lottery_strategy(*id)),
    )
    .await?;
    info!(strategies = ?config.raffle.strategy_ids, "Strategies assembled");

    for strategy_id in &config.raffle.strategy_ids {
        let factor = RaffleFactor::new(config.raffle.user_id.clone(), *strategy_id);

        for draw in 1..=config.raffle.draws {
            match app_state.raffle.perform_raffle(&factor).await {
                Ok(result) => info!(
                    strategy_id,
                    draw,
                    award_id = ?result.award_id,
                    award_desc = ?result.award_desc,
                    "Raffle result"
                ),
                Err(e) => warn!(strategy_id, draw, code = e.code(), error = %e, "Raffle failed"),
            }
        }
    }

    Ok(())
}
