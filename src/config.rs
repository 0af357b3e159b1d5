//! Engine configuration
//!
//! Environment Variables:
//! - `BQLITE_FIXED_NOW_USEC` - Pin NOW()/CURRENT_* to this many microseconds since the epoch
//! - `BQLITE_RAND_SEED` - Seed for RAND()
//! - `BQLITE_MAX_INTERMEDIATE_ROWS` - Upper bound on rows produced by a join

use std::env;

/// Default seed for RAND()
pub const DEFAULT_RAND_SEED: u64 = 0x5eed;

/// Configuration for query evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Clock value for time functions (None = read the system clock once per query)
    pub fixed_now: Option<i64>,

    /// Seed for RAND(), reapplied at the start of every query
    pub rand_seed: u64,

    /// Maximum rows a materialized join may produce (None = unlimited)
    pub max_intermediate_rows: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fixed_now: None,
            rand_seed: DEFAULT_RAND_SEED,
            max_intermediate_rows: None,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from environment variables
    ///
    /// Unset or unparseable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(now) = env_parse::<i64>("BQLITE_FIXED_NOW_USEC") {
            config.fixed_now = Some(now);
        }
        if let Some(seed) = env_parse::<u64>("BQLITE_RAND_SEED") {
            config.rand_seed = seed;
        }
        if let Some(limit) = env_parse::<usize>("BQLITE_MAX_INTERMEDIATE_ROWS") {
            config.max_intermediate_rows = Some(limit);
        }
        config
    }

    /// Pin the clock used by time functions
    #[must_use]
    pub fn with_fixed_now(mut self, micros: i64) -> Self {
        self.fixed_now = Some(micros);
        self
    }

    /// Set the RAND() seed
    #[must_use]
    pub fn with_rand_seed(mut self, seed: u64) -> Self {
        self.rand_seed = seed;
        self
    }

    /// Bound the size of materialized joins
    #[must_use]
    pub fn with_max_intermediate_rows(mut self, rows: usize) -> Self {
        self.max_intermediate_rows = Some(rows);
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable config value");
                None
            }
        },
        Err(_) => None,
    }
}
