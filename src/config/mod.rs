//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod lifecycle;
mod metrics;
mod storage;
mod trigger;

pub use lifecycle::{
    LifecycleConfig, DEFAULT_FETCH_CONCURRENCY, DEFAULT_GRACE_PERIOD_SECS,
    DEFAULT_MAX_LOCK_RETRIES, DEFAULT_RETRY_FAILURE_THRESHOLD,
};
pub use metrics::MetricsProviderConfig;
pub use storage::StorageConfig;
pub use trigger::TriggerConfig;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "PAYOUT_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "PAYOUT";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "PAYOUT_LOG";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Lock and distribute phase settings.
    pub lifecycle: LifecycleConfig,
    /// Metrics provider client.
    pub metrics: MetricsProviderConfig,
    /// Trigger endpoint and ticker.
    pub trigger: TriggerConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, e.g.
    ///    `PAYOUT__TRIGGER__SECRET`
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }

    /// Create config for testing: in-memory storage, no grace period.
    pub fn for_test() -> Self {
        Self {
            storage: StorageConfig::in_memory(),
            lifecycle: LifecycleConfig {
                grace_period_secs: 0,
                ..LifecycleConfig::default()
            },
            ..Self::default()
        }
    }
}
