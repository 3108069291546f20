use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use serde::Deserialize;
use watch_engine::{ApiSettings, WatchSettings};
use watch_logging::parse_level;

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "starwatch.ron";
pub const API_URL_ENV: &str = "STARWATCH_API_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("unknown log level {0:?}")]
    LogLevel(String),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Contents of `starwatch.ron`; every field is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Interval of the TCP reachability probe against the API host.
    pub probe_interval_secs: u64,
    pub log_level: String,
    pub log_destination: LogDestination,
    /// Set when `STARWATCH_API_URL` replaced `api_url`.
    #[serde(skip)]
    pub api_url_from_env: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        let watch = WatchSettings::default();
        Self {
            api_url: api.base_url,
            request_timeout_secs: api.request_timeout.as_secs(),
            connect_timeout_secs: api.connect_timeout.as_secs(),
            poll_interval_secs: watch.poll_interval.as_secs(),
            probe_interval_secs: 5,
            log_level: "info".to_string(),
            log_destination: LogDestination::File,
            api_url_from_env: false,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `starwatch.ron` in the working directory.
    ///
    /// Only an explicitly named file has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let mut config = match fs::read_to_string(&path) {
            Ok(text) => ron::from_str::<AppConfig>(&text)
                .map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
                AppConfig::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        config.apply_env(std::env::var(API_URL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.filter(|url| !url.trim().is_empty()) {
            self.api_url = url.trim().to_string();
            self.api_url_from_env = true;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.level()?;
        for (name, value) in [
            ("request_timeout_secs", self.request_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("poll_interval_secs", self.poll_interval_secs),
            ("probe_interval_secs", self.probe_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        Ok(())
    }

    pub fn level(&self) -> Result<LevelFilter, ConfigError> {
        parse_level(&self.log_level).ok_or_else(|| ConfigError::LogLevel(self.log_level.clone()))
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..ApiSettings::default()
        }
    }

    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            ..WatchSettings::default()
        }
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(text.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn defaults_match_engine_settings() {
        let config = AppConfig::default();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.watch_settings(), WatchSettings::default());
        assert_eq!(config.api_settings().request_timeout, Duration::from_secs(300));
        assert_eq!(config.level().expect("level"), LevelFilter::Info);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let file = write_config(
            r#"(
                api_url: "https://classifier.example.com/api",
                poll_interval_secs: 5,
                log_destination: Both,
            )"#,
        );
        let config = AppConfig::load(Some(file.path())).expect("load");
        assert_eq!(config.api_url, "https://classifier.example.com/api");
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.log_destination, LogDestination::Both);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = AppConfig::load(Some(&dir.path().join("absent.ron"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_reports_path() {
        let file = write_config("(poll_interval_secs: \"soon\")");
        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let file = write_config("(poll_interval_secs: 0)");
        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDuration("poll_interval_secs")));
    }

    #[test]
    fn unknown_level_is_rejected() {
        let config = AppConfig {
            log_level: "chatty".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::LogLevel(_))));
    }

    #[test]
    fn env_url_overrides_file() {
        let mut config = AppConfig::default();
        config.apply_env(None);
        assert!(!config.api_url_from_env);

        config.apply_env(Some(" http://10.0.0.5:9000 ".to_string()));
        assert_eq!(config.api_url, "http://10.0.0.5:9000");
        assert!(config.api_url_from_env);

        let mut config = AppConfig::default();
        config.apply_env(Some(String::new()));
        assert_eq!(config.api_url, "http://localhost:8000");
        assert!(!config.api_url_from_env);
    }
}
