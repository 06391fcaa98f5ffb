use contact_relay::config::{BOT_TOKEN_ENV, CHAT_IDS_ENV, Config as RelayConfig, ValidationError};
use serde::Deserialize;
use std::fs::File;

const DEFAULT_METRICS_PREFIX: &str = "contactd";

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    DEFAULT_METRICS_PREFIX.into()
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Deserialize, Debug, Default)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    #[serde(flatten)]
    pub relay: RelayConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Replaces the Telegram credentials with values from the environment
    /// when those are set and not blank.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key| lookup(key).filter(|value: &String| !value.trim().is_empty());

        if let Some(token) = non_blank(BOT_TOKEN_ENV) {
            self.relay.telegram.bot_token = Some(token);
        }
        if let Some(chat_ids) = non_blank(CHAT_IDS_ENV) {
            self.relay.telegram.chat_ids = Some(chat_ids);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.relay.validate()?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    ValidationError(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            listener:
                host: 0.0.0.0
                port: 9000
            admin_listener:
                host: 127.0.0.1
                port: 9001
            endpoint:
                path: /api/contact
            telegram:
                timeout_ms: 3000
                chat_ids: "111,222"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example.com/1
                format: json
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        config.validate().expect("valid config");

        assert_eq!(config.relay.listener.port, 9000);
        assert_eq!(config.relay.admin_listener.port, 9001);
        assert_eq!(config.relay.endpoint.path, "/api/contact");
        assert_eq!(config.relay.telegram.timeout_ms, 3000);
        assert_eq!(config.relay.telegram.recipients(), vec!["111", "222"]);

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "contactd");
        assert_eq!(config.common.logging.format, LogFormat::Json);
        assert!(config.common.logging.sentry_dsn.is_some());
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let tmp = write_tmp_file("{}");
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(config.relay.listener.port, 8080);
        assert_eq!(config.relay.endpoint.path, "/contact");
        assert!(config.common.metrics.is_none());
        assert_eq!(config.common.logging, LoggingConfig::default());
        assert!(!config.relay.telegram.is_configured());
    }

    #[test]
    fn env_overrides_file_values() {
        let tmp = write_tmp_file(
            r#"
            telegram:
                bot_token: from-file
                chat_ids: "1"
            "#,
        );
        let mut config = Config::from_file(tmp.path()).expect("load config");

        let env = HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "123:from-env".to_string()),
            ("TELEGRAM_CHAT_IDS", "   ".to_string()),
        ]);
        config.apply_env_overrides(|key| env.get(key).cloned());

        assert_eq!(config.relay.telegram.bot_token(), Some("123:from-env"));
        // Blank environment values leave the file value in place
        assert_eq!(config.relay.telegram.recipients(), vec!["1"]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let tmp = write_tmp_file("endpoint: {path: contact}");
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let tmp = write_tmp_file("listener: [1, 2]");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        assert!(matches!(
            Config::from_file(std::path::Path::new("/nonexistent/contactd.yaml")),
            Err(ConfigError::LoadError(_))
        ));
    }
}
