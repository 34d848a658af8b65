use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{AttributionConfig, Config, DatabaseConfig, LoggingConfig, ServerConfig};

/// Prefix for environment overrides, e.g. `ATTRIBUTION__SERVER__PORT=8080`.
const ENV_PREFIX: &str = "ATTRIBUTION";

/// Loads the application configuration from `config.toml` in the working directory.
///
/// The file is optional. Environment variables prefixed with `ATTRIBUTION__` are layered
/// on top, and the result is validated before it is returned.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(Path::new("config.toml"))
}

/// Same as [`load_config`], reading the given file instead.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

    let config = builder.build()?.try_deserialize::<Config>()?;
    validate(&config)?;
    Ok(config)
}

/// Rejects values that would only fail later, at connect or bind time.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database.max_connections == 0 {
        return Err(ConfigError::ValidationError(
            "database.max_connections must be at least 1".to_string(),
        ));
    }
    if config.database.acquire_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "database.acquire_timeout_secs must be at least 1".to_string(),
        ));
    }
    if config.server.host.trim().is_empty() {
        return Err(ConfigError::ValidationError("server.host must not be empty".to_string()));
    }
    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::ValidationError("logging.level must not be empty".to_string()));
    }
    Ok(())
}
