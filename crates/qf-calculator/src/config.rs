//! Calculator configuration.
//!
//! [`CalculatorConfig`] carries defaults for the data directory, the round
//! contribution cache, the allocation worker pool, the coefficient band, and
//! the per-chain token table. It can be built programmatically or loaded from
//! a TOML file layered with `QF_`-prefixed environment variables
//! (`QF_DATA_DIR`, `QF_ROUND_CACHE__CAPACITY`, ...).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use qf_core::constants::{DEFAULT_ROUND_CACHE_CAPACITY, DEFAULT_ROUND_CACHE_TTL_SECS};
use qf_core::types::{ChainConfig, ChainId, ProportionalMatchOptions};

use crate::error::ConfigError;

/// Environment variable prefix for config overrides.
pub const ENV_PREFIX: &str = "QF";

/// Round contribution cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoundCacheConfig {
    /// Maximum number of rounds held at once. Zero disables the cache.
    pub capacity: usize,
    /// Seconds an entry stays valid after it was stored.
    pub ttl_secs: u64,
}

impl Default for RoundCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_ROUND_CACHE_CAPACITY,
            ttl_secs: DEFAULT_ROUND_CACHE_TTL_SECS,
        }
    }
}

impl RoundCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Allocation worker pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Jobs that may wait for a free worker before `dispatch` backs off.
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers,
            queue_capacity: workers * 4,
        }
    }
}

/// Configuration for a calculator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    /// Root directory holding round data and the passport snapshot.
    pub data_dir: PathBuf,
    /// Log level filter string (e.g. "info", "qf_calculator=debug").
    pub log_level: String,
    /// Seconds a loaded data file stays in the provider cache. Capped at the
    /// round cache TTL so an expired round is rebuilt from fresh files.
    pub data_cache_ttl_secs: u64,
    /// Let raw matches below the pool stand instead of scaling them up.
    pub ignore_saturation: bool,
    pub proportional_match: ProportionalMatchOptions,
    pub round_cache: RoundCacheConfig,
    pub dispatcher: DispatcherConfig,
    pub chains: Vec<ChainConfig>,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("qf-match");

        Self {
            data_dir,
            log_level: "info".to_string(),
            data_cache_ttl_secs: DEFAULT_ROUND_CACHE_TTL_SECS,
            ignore_saturation: true,
            proportional_match: ProportionalMatchOptions::default(),
            round_cache: RoundCacheConfig::default(),
            dispatcher: DispatcherConfig::default(),
            chains: Vec::new(),
        }
    }
}

impl CalculatorConfig {
    /// Load defaults, then `path` (if any), then `QF_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, env_source())
    }

    /// Same as [`load`](Self::load) with an explicit environment source.
    pub fn load_with_env(
        path: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, ConfigError> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let cfg: Self = builder
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatcher.workers == 0 {
            return Err(ConfigError::Invalid("dispatcher.workers must be at least 1".into()));
        }
        if self.dispatcher.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.queue_capacity must be at least 1".into(),
            ));
        }
        self.proportional_match
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// Token table for `chain_id`.
    pub fn chain(&self, chain_id: ChainId) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.id == chain_id)
    }

    /// Provider cache TTL: `data_cache_ttl_secs`, never longer than the round
    /// cache TTL.
    pub fn data_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.data_cache_ttl_secs.min(self.round_cache.ttl_secs))
    }
}

/// `QF_`-prefixed environment source; `__` separates nested keys.
pub fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> config::Environment {
        env_source().source(Some(config::Map::new()))
    }

    #[test]
    fn default_round_cache_matches_constants() {
        let cfg = CalculatorConfig::default();
        assert_eq!(cfg.round_cache.capacity, 10);
        assert_eq!(cfg.round_cache.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn default_dispatcher_has_workers() {
        let cfg = CalculatorConfig::default();
        assert!(cfg.dispatcher.workers >= 1);
        assert!(cfg.dispatcher.queue_capacity >= cfg.dispatcher.workers);
    }

    #[test]
    fn default_log_level_is_info() {
        assert_eq!(CalculatorConfig::default().log_level, "info");
    }

    #[test]
    fn default_data_dir_ends_with_qf_match() {
        let cfg = CalculatorConfig::default();
        assert!(cfg.data_dir.ends_with("qf-match"));
    }

    #[test]
    fn default_band_is_valid() {
        assert!(CalculatorConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let mut cfg = CalculatorConfig::default();
        cfg.dispatcher.workers = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn inverted_band_rejected() {
        let mut cfg = CalculatorConfig::default();
        cfg.proportional_match.score.min = 30.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn data_cache_ttl_bounded_by_round_cache() {
        let mut cfg = CalculatorConfig::default();
        assert_eq!(cfg.data_cache_ttl(), cfg.round_cache.ttl());
        cfg.data_cache_ttl_secs = 60;
        assert_eq!(cfg.data_cache_ttl(), Duration::from_secs(60));
        cfg.data_cache_ttl_secs = 3_600;
        assert_eq!(cfg.data_cache_ttl(), Duration::from_secs(300));
        cfg.round_cache.ttl_secs = 0;
        assert_eq!(cfg.data_cache_ttl(), Duration::ZERO);
    }

    #[test]
    fn load_without_file_yields_defaults() {
        let cfg = CalculatorConfig::load_with_env(None, no_env()).unwrap();
        assert_eq!(cfg.round_cache, RoundCacheConfig::default());
        assert!(cfg.chains.is_empty());
    }

    #[test]
    fn load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qf.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/srv/qf"

[round_cache]
capacity = 3

[dispatcher]
workers = 2
queue_capacity = 8

[[chains]]
id = 10
name = "optimism"

[[chains.tokens]]
address = "0xDAI"
code = "DAI"
decimals = 18
vote_amount_cap = "10000000000000000000"
"#,
        )
        .unwrap();

        let cfg = CalculatorConfig::load_with_env(Some(&path), no_env()).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/qf"));
        assert_eq!(cfg.round_cache.capacity, 3);
        assert_eq!(cfg.round_cache.ttl_secs, DEFAULT_ROUND_CACHE_TTL_SECS);
        assert_eq!(cfg.dispatcher.workers, 2);

        let chain = cfg.chain(10).unwrap();
        let token = chain.token("0xdai").unwrap();
        assert_eq!(token.decimals, 18);
        assert_eq!(
            token.vote_amount_cap.as_ref().map(|c| c.to_string()),
            Some("10000000000000000000".to_string())
        );
        assert!(cfg.chain(1).is_none());
    }

    #[test]
    fn environment_overrides_file() {
        let env: config::Map<String, String> = [
            ("QF_ROUND_CACHE__CAPACITY".to_string(), "7".to_string()),
            ("QF_LOG_LEVEL".to_string(), "debug".to_string()),
        ]
        .into_iter()
        .collect();

        let cfg =
            CalculatorConfig::load_with_env(None, env_source().source(Some(env))).unwrap();
        assert_eq!(cfg.round_cache.capacity, 7);
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn missing_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = CalculatorConfig::load_with_env(Some(&path), no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
