pub mod rate_table;
pub mod store;

pub use rate_table::{strategy_key, RateTableCache};
pub use store::{CacheStore, InMemoryCacheStore};
