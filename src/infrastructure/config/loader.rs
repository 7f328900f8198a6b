//! Configuration loader with hierarchical merging: a `Figment` merge order
//! followed by a post-merge `validate` step.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::errors::ConfigError;
use crate::domain::models::Config;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `config/index.yaml` (project config)
    /// 3. `INDEX_`-prefixed environment variables, `__`-nested
    pub fn load() -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("config/index.yaml"))
            .merge(Env::prefixed("INDEX_").split("__"))
            .extract()?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping the environment
    /// override layer. Used by the CLI's `--config` flag.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading. Fatal at startup.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.max_poll_error_delay_factor < 1 {
            return Err(ConfigError::InvalidMaxPollErrorDelayFactor(
                config.max_poll_error_delay_factor,
            ));
        }

        if config.local_db.is_empty() {
            return Err(ConfigError::EmptyLocalDb);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.concurrency < 1 {
            return Err(ConfigError::InvalidConcurrency(config.concurrency));
        }

        if config.max_related_depth < 1 {
            return Err(ConfigError::InvalidMaxRelatedDepth(config.max_related_depth));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn yaml_overrides_defaults() {
        let yaml = "concurrency: 8\nlogging:\n  level: debug\n  format: pretty\n";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
        ConfigLoader::validate(&config).expect("parsed config should be valid");
    }

    #[test]
    fn hierarchical_merging_lets_override_win_and_base_persist() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "concurrency: 2\nlogging:\n  level: info\n  format: json").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "concurrency: 16\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.concurrency, 16, "override should win");
        assert_eq!(config.logging.level, "debug", "override should win for nested fields");
        assert_eq!(config.logging.format, "json", "base value should persist when not overridden");
    }

    #[test]
    fn env_vars_override_yaml_and_defaults() {
        temp_env::with_vars(
            [
                ("INDEX_CONCURRENCY", Some("12")),
                ("INDEX_LOGGING__LEVEL", Some("warn")),
            ],
            || {
                let config: Config = Figment::new()
                    .merge(Serialized::defaults(Config::default()))
                    .merge(Env::prefixed("INDEX_").split("__"))
                    .extract()
                    .unwrap();
                assert_eq!(config.concurrency, 12);
                assert_eq!(config.logging.level, "warn");
            },
        );
    }

    #[test]
    fn rejects_zero_max_poll_error_delay_factor() {
        let config = Config {
            max_poll_error_delay_factor: 0,
            ..Config::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxPollErrorDelayFactor(0))
        ));
    }

    #[test]
    fn rejects_empty_local_db_path() {
        let config = Config {
            local_db: String::new(),
            ..Config::default()
        };
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyLocalDb)));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let config = Config {
            logging: crate::domain::models::config::LoggingConfig {
                level: "verbose".to_string(),
                ..crate::domain::models::config::LoggingConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(level)) if level == "verbose"
        ));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let config = Config {
            logging: crate::domain::models::config::LoggingConfig {
                format: "xml".to_string(),
                ..crate::domain::models::config::LoggingConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(format)) if format == "xml"
        ));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let config = Config {
            concurrency: 0,
            ..Config::default()
        };
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidConcurrency(0))));
    }

    #[test]
    fn rejects_zero_max_related_depth() {
        let config = Config {
            max_related_depth: 0,
            ..Config::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxRelatedDepth(0))
        ));
    }
}
