//! Configuration system for the ImputeX client.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/imputex/config.toml` and/or `.imputex/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Top-level configuration for the ImputeX client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImputexConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub ui: UiConfig,
}

/// Where the imputation service lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the API version prefix.
    pub base_url: String,
    /// Upper bound for any single request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Job status polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Terminal presentation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// How many trailing log lines to show.
    pub log_tail: usize,
    /// Open the download location in the system browser once a job completes.
    pub open_download: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            log_tail: 20,
            open_download: false,
        }
    }
}

impl ImputexConfig {
    /// Check for problems. Returns a list of human-readable messages; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        match url::Url::parse(&self.api.base_url) {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => problems.push(format!(
                "api.base_url must use http or https, got '{}'",
                url.scheme()
            )),
            Ok(_) => {}
            Err(e) => problems.push(format!("api.base_url is not a valid URL: {e}")),
        }
        if self.api.request_timeout_secs == 0 {
            problems.push("api.request_timeout_secs must be greater than 0".to_string());
        }
        if self.polling.interval_ms == 0 {
            problems.push("polling.interval_ms must be greater than 0".to_string());
        }
        problems
    }

    /// Like [`validate`](Self::validate) but folds the problems into one error.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid {
                message: problems.join("; "),
            })
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `IMPUTEX_`)
/// 3. Workspace-local config (`.imputex/config.toml`)
/// 4. User config (`~/.config/imputex/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ImputexConfig>,
) -> Result<ImputexConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ImputexConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "imputex", "imputex") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".imputex").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // IMPUTEX_API__BASE_URL, IMPUTEX_POLLING__INTERVAL_MS, etc.
    figment = figment.merge(Env::prefixed("IMPUTEX_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

/// Render a configuration as pretty TOML.
pub fn to_toml(config: &ImputexConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}
