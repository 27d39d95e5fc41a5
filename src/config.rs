use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub raffle: RaffleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Records come from Postgres when set, from the seed file otherwise
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaffleConfig {
    pub seed_path: String,
    /// Strategies assembled on start
    pub strategy_ids: Vec<i64>,
    pub user_id: String,
    pub draws: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
            },
            raffle: RaffleConfig {
                seed_path: "data/strategy_seed.json".to_string(),
                strategy_ids: vec![100001],
                user_id: "user001".to_string(),
                draws: 10,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            config.database.url = Some(url);
        }
        if let Some(raw) = lookup("DB_MAX_CONNECTIONS") {
            config.database.max_connections =
                parse_or("DB_MAX_CONNECTIONS", &raw, config.database.max_connections);
        }
        if let Some(path) = lookup("RAFFLE_SEED_PATH") {
            config.raffle.seed_path = path;
        }
        if let Some(raw) = lookup("RAFFLE_STRATEGY_IDS") {
            config.raffle.strategy_ids = parse_ids(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Invalid RAFFLE_STRATEGY_IDS, using default");
                config.raffle.strategy_ids.clone()
            });
        }
        if let Some(user_id) = lookup("RAFFLE_USER_ID").filter(|u| !u.trim().is_empty()) {
            config.raffle.user_id = user_id;
        }
        if let Some(raw) = lookup("RAFFLE_DRAWS") {
            config.raffle.draws = parse_or("RAFFLE_DRAWS", &raw, config.raffle.draws);
        }

        config
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or_else(|_| {
        warn!(key, value = %raw, "Invalid number, using default");
        default
    })
}

fn parse_ids(raw: &str) -> Option<Vec<i64>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;

    (!ids.is_empty()).then_some(ids)
}
