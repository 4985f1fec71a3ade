//! Application configuration.
//!
//! Deployment configuration only: where state lives and how the host is
//! observed. Business settings (commission percentages, withdrawal limits)
//! are runtime data owned by the settings store, not configuration.

mod storage;

pub use storage::{SqliteConfig, StorageConfig, StorageType};

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "PAYLEDGER_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "PAYLEDGER";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "PAYLEDGER_LOG";
/// Environment variable for database URL override.
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage backend configuration.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Precedence (lowest to highest): defaults, the YAML file named by
    /// PAYLEDGER_CONFIG (or `config.yaml` when present), then
    /// `PAYLEDGER__`-prefixed environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());

        let mut builder = config::Config::builder();
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(&path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(CONFIG_ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // DATABASE_URL wins over everything, matching container conventions.
        if let Ok(url) = std::env::var(DATABASE_URL_ENV_VAR) {
            cfg.storage.apply_url(&url);
        }

        Ok(cfg)
    }

    /// Parse configuration from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.storage_type, StorageType::Sqlite);
        assert_eq!(config.storage.sqlite.path, "payledger.db");
    }

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(
            r#"
storage:
  type: sqlite
  sqlite:
    path: /var/lib/payledger/ledger.db
"#,
        )
        .unwrap();
        assert_eq!(config.storage.storage_type, StorageType::Sqlite);
        assert_eq!(config.storage.sqlite.path, "/var/lib/payledger/ledger.db");
    }
}
