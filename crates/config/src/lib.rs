//! Configuration management for rivulet applications
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then environment variables prefixed with `RIVULET_` (nested keys separated
//! by `__`, e.g. `RIVULET_ENGINE__WINDOW_SIZE_MS=60000`).

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use processor::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Identifies the application; prefixes state store names
    pub application_id: String,

    /// Stream engine settings
    pub engine: EngineConfig,

    /// Observability settings
    pub observability: ObservabilityConfig,

    /// Synthetic transaction generator settings
    pub generator: GeneratorConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::LoadError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            figment = figment.merge(Yaml::file(path));
        }

        // Override with environment variables (prefixed with RIVULET_)
        figment = figment.merge(Env::prefixed("RIVULET_").split("__"));

        figment.extract().map_err(|e| ConfigError::LoadError(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.application_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "application_id must not be empty".to_string(),
            ));
        }

        self.engine
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        self.observability.validate()?;
        self.generator.validate()?;

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            application_id: "rivulet".to_string(),
            engine: EngineConfig::default(),
            observability: ObservabilityConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or filter directive, e.g. `info` or `processor=debug`
    pub log_level: String,

    /// Enable structured JSON logging
    pub json_logging: bool,
}

impl ObservabilityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "observability.log_level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

/// Transaction generator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Number of transactions to produce
    pub count: usize,

    /// Event-time gap between consecutive transactions in milliseconds
    pub interval_ms: u64,

    /// Seed for reproducible output; random when absent
    pub seed: Option<u64>,

    /// Timestamp of the first transaction in epoch milliseconds; now when absent
    pub start_time_ms: Option<i64>,
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(ConfigError::ValidationError(
                "generator.count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: 1000,
            interval_ms: 1000,
            seed: None,
            start_time_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use processor::config::RecordErrorPolicy;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.application_id, "rivulet");
        assert_eq!(config.engine.window_size_ms, 300_000);
        assert_eq!(config.engine.commit_interval_ms, 0);
        assert_eq!(config.generator.count, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_sources() {
        Jail::expect_with(|_jail| {
            let config = AppConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config, AppConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_yaml_with_camel_case_engine_keys() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "rivulet.yaml",
                r#"
                application_id: city-orders
                engine:
                  windowSizeMs: 60000
                  commitIntervalMs: 1000
                  onRecordError: halt
                observability:
                  json_logging: true
                "#,
            )?;

            let config = AppConfig::load(Some("rivulet.yaml".into())).map_err(|e| e.to_string())?;
            assert_eq!(config.application_id, "city-orders");
            assert_eq!(config.engine.window_size_ms, 60_000);
            assert_eq!(config.engine.commit_interval_ms, 1000);
            assert_eq!(config.engine.on_record_error, RecordErrorPolicy::Halt);
            assert!(config.observability.json_logging);
            assert_eq!(config.observability.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("rivulet.yaml", "engine:\n  window_size_ms: 60000\n")?;
            jail.set_env("RIVULET_ENGINE__WINDOW_SIZE_MS", "5000");
            jail.set_env("RIVULET_GENERATOR__SEED", "42");

            let config = AppConfig::load(Some("rivulet.yaml".into())).map_err(|e| e.to_string())?;
            assert_eq!(config.engine.window_size_ms, 5000);
            assert_eq!(config.generator.seed, Some(42));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        Jail::expect_with(|_jail| {
            let err = AppConfig::load(Some("missing.yaml".into())).unwrap_err();
            assert!(matches!(err, ConfigError::LoadError(_)));
            Ok(())
        });
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.engine.window_size_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = AppConfig::default();
        config.application_id = String::new();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.generator.count = 0;
        assert!(config.validate().is_err());
    }
}
