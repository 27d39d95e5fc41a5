// Library crate for the big market raffle engine
// This file exposes the public API for the runner and integration tests

pub mod cache;
pub mod config;
pub mod shared;
pub mod strategy;

pub use cache::{CacheStore, InMemoryCacheStore};
pub use config::Config;
pub use shared::{AppError, AppState};
pub use strategy::{
    rule::{LogicFilter, LogicFilterRegistry, RuleModel},
    InMemoryRaffleActivity, InMemoryStrategyRepository, RaffleActivity, RaffleFactor,
    RaffleResult, RaffleStrategy, SeedData, StrategyRepository,
};
