//! Console configuration, read from a RON file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hub_core::Timings;
use hub_engine::ApiSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::logging::LogDestination;

const POLL_INTERVAL_RANGE_MS: (u64, u64) = (2_000, 5_000);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("RON parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub api_base_url: String,
    /// Bearer token; `HUB_ACCESS_TOKEN` is used when unset.
    pub access_token: Option<String>,
    pub debounce_ms: u64,
    pub poll_interval_ms: u64,
    pub job_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub recovery_dir: PathBuf,
    pub log_destination: LogDestination,
}

impl Default for HubConfig {
    fn default() -> Self {
        let timings = Timings::default();
        let api = ApiSettings::default();
        Self {
            api_base_url: api.base_url,
            access_token: None,
            debounce_ms: timings.debounce.as_millis() as u64,
            poll_interval_ms: timings.poll_interval.as_millis() as u64,
            job_timeout_secs: timings.job_timeout.as_secs(),
            connect_timeout_secs: api.connect_timeout.as_secs(),
            request_timeout_secs: api.request_timeout.as_secs(),
            recovery_dir: PathBuf::from(".hub_recovery"),
            log_destination: LogDestination::File,
        }
    }
}

impl HubConfig {
    /// Loads `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid(
                "api_base_url must start with http:// or https://".to_string(),
            ));
        }
        if self.debounce_ms == 0 {
            return Err(ConfigError::Invalid("debounce_ms must be > 0".to_string()));
        }
        let (min, max) = POLL_INTERVAL_RANGE_MS;
        if !(min..=max).contains(&self.poll_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms must lie in {min}..={max}"
            )));
        }
        let timings = self.timings();
        if timings.job_timeout <= timings.poll_interval {
            return Err(ConfigError::Invalid(
                "job_timeout_secs must exceed the poll interval".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "HTTP timeouts must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timings(&self) -> Timings {
        Timings {
            debounce: Duration::from_millis(self.debounce_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            job_timeout: Duration::from_secs(self.job_timeout_secs),
        }
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api_base_url.trim().to_string(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = HubConfig::load(None).unwrap();
        assert_eq!(config.timings(), Timings::default());
        assert_eq!(config.poll_interval_ms, 3_000);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"(api_base_url: "https://hub.example.org/api", poll_interval_ms: 2000, log_destination: Both)"#
        )
        .unwrap();

        let config = HubConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.api_base_url, "https://hub.example.org/api");
        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.log_destination, LogDestination::Both);
        assert_eq!(config.debounce_ms, 500);
    }

    #[test]
    fn poll_interval_outside_range_is_rejected() {
        let config = HubConfig {
            poll_interval_ms: 1_000,
            ..HubConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn job_timeout_is_compared_without_overflow() {
        let huge = HubConfig {
            job_timeout_secs: u64::MAX,
            ..HubConfig::default()
        };
        assert!(huge.validate().is_ok());

        let too_short = HubConfig {
            job_timeout_secs: 2,
            poll_interval_ms: 3_000,
            ..HubConfig::default()
        };
        assert!(matches!(too_short.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(debounce_ms: \"soon\")").unwrap();

        assert!(matches!(
            HubConfig::load(Some(file.path())),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let result = HubConfig::load(Some(Path::new("/nonexistent/hub.ron")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
