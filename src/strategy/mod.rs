pub mod activity;
pub mod armory;
pub mod dispatch;
pub mod models;
pub mod raffle;
pub mod repository;
pub mod rule;
pub mod seed;

pub use activity::{InMemoryRaffleActivity, RaffleActivity};
pub use armory::{build_rate_table, StrategyArmory};
pub use dispatch::{DefaultStrategyDispatch, StrategyDispatch};
pub use models::{RaffleFactor, RaffleResult, RateTable, StrategyAward, StrategyConfig, StrategyRule};
pub use raffle::{DefaultRaffleStrategy, RaffleStrategy};
pub use repository::{InMemoryStrategyRepository, PostgresStrategyRepository, StrategyRepository};
pub use seed::SeedData;
