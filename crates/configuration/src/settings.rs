use core_types::{Environment, Period};
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
///
/// Every section is optional in `config.toml`; omitted sections fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub attribution: AttributionConfig,
}

/// Connection settings for the PostgreSQL ledger.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Falls back to the `DATABASE_URL` environment variable when unset.
    pub url: Option<String>,
    pub max_connections: u32,
    /// How long a query waits for a pooled connection before failing.
    pub acquire_timeout_secs: u64,
    /// Apply pending migrations on startup.
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 5,
            run_migrations: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive, e.g. `info` or `engine=debug,info`. `RUST_LOG` wins when set.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: "attribution.log".to_string(),
            json: false,
        }
    }
}

/// Defaults and switches for the attribution engine itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    pub default_environment: Environment,
    pub default_period: Period,
    /// Cross-check every dimension breakdown against the summary of the same batch.
    pub verify_consistency: bool,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            default_environment: Environment::Mainnet,
            default_period: Period::AllTime,
            verify_consistency: true,
        }
    }
}
