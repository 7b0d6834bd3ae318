//! Client configuration.
//!
//! Loaded from `<config_dir>/poromet/config.toml` when that file exists,
//! otherwise every field falls back to its default. The resulting `Config`
//! is handed to `Session::new`; nothing reads it from global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::error::PorometError;
use crate::params::AnalysisParams;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_SERVER_START_COMMAND: &str = "python backend/server.py";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base address of the analysis service, e.g. "http://127.0.0.1:8000"
    pub api_base_url: String,
    /// Shown in the offline hint as the way to bring the service up
    pub server_start_command: String,
    pub health_interval_secs: u64,
    /// Per-probe timeout; kept below the interval so probes never overlap
    pub health_timeout_secs: u64,
    /// Upper bound on a single analysis request
    pub request_timeout_secs: u64,
    pub progress_tick_ms: u64,
    pub progress_step: u8,
    pub progress_ceiling: u8,
    /// Where result bundles are saved. Defaults to the user's download folder.
    pub download_dir: Option<PathBuf>,
    pub default_params: AnalysisParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            server_start_command: DEFAULT_SERVER_START_COMMAND.to_string(),
            health_interval_secs: 5,
            health_timeout_secs: 4,
            request_timeout_secs: 300,
            progress_tick_ms: 1000,
            progress_step: 10,
            progress_ceiling: 90,
            download_dir: None,
            default_params: AnalysisParams::default(),
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("poromet").join("config.toml"))
    }

    /// Load from the default location, or defaults if there is no file.
    pub fn load() -> Result<Self, PorometError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, PorometError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PorometError::Config(format!("Failed to read {:?}: {}", path, e)))?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PorometError> {
        let config: Config = toml::from_str(text)
            .map_err(|e| PorometError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PorometError> {
        self.base_url()?;
        if self.health_interval_secs == 0 {
            return Err(PorometError::Config(
                "health_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.health_timeout_secs == 0 {
            return Err(PorometError::Config(
                "health_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(PorometError::Config(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.progress_tick_ms == 0 {
            return Err(PorometError::Config(
                "progress_tick_ms must be at least 1".to_string(),
            ));
        }
        if self.progress_ceiling >= 100 {
            return Err(PorometError::Config(
                "progress_ceiling must stay below 100".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed service address. Only http and https are accepted.
    pub fn base_url(&self) -> Result<Url, PorometError> {
        let url = Url::parse(&self.api_base_url).map_err(|e| {
            PorometError::Config(format!("Invalid api_base_url '{}': {}", self.api_base_url, e))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(PorometError::Config(format!(
                "Unsupported scheme '{}' in api_base_url",
                other
            ))),
        }
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }

    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_client() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://127.0.0.1:8000");
        assert_eq!(config.health_interval(), Duration::from_secs(5));
        assert_eq!(config.progress_tick(), Duration::from_secs(1));
        assert_eq!(config.progress_step, 10);
        assert_eq!(config.progress_ceiling, 90);
        assert_eq!(config.default_params.magnification, 300.0);
        assert_eq!(config.default_params.max_diam_nm, 80.0);
        assert_eq!(config.default_params.thresh_mag, 1.8);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            api_base_url = "http://lab-server:9000"
            request_timeout_secs = 60

            [default_params]
            magnification = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.api_base_url, "http://lab-server:9000");
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.health_interval_secs, 5);
        assert_eq!(config.default_params.magnification, 500.0);
        assert_eq!(config.default_params.max_diam_nm, 80.0);
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = Config::from_toml_str(r#"api_base_url = "ftp://example.com""#).unwrap_err();
        assert!(matches!(err, PorometError::Config(_)), "got {:?}", err);
    }

    #[test]
    fn test_rejects_garbage_toml() {
        assert!(Config::from_toml_str("api_base_url = [").is_err());
    }

    #[test]
    fn test_rejects_ceiling_at_100() {
        let err = Config::from_toml_str("progress_ceiling = 100").unwrap_err();
        assert!(err.to_string().contains("progress_ceiling"));
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let err = Config::from_toml_str("health_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("health_timeout_secs"));
        let err = Config::from_toml_str("request_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
        assert!(Config::from_toml_str("request_timeout_secs = 1\nhealth_timeout_secs = 1").is_ok());
    }

    #[test]
    fn test_explicit_download_dir_wins() {
        let config = Config {
            download_dir: Some(PathBuf::from("/tmp/poromet")),
            ..Config::default()
        };
        assert_eq!(config.resolved_download_dir(), PathBuf::from("/tmp/poromet"));
    }
}
