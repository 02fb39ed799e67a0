//! Configuration system for FactShield.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/factshield/config.toml` and/or
//! `.factshield/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Top-level configuration for a FactShield client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactShieldConfig {
    pub service: ServiceConfig,
    pub analysis: AnalysisConfig,
    pub display: DisplayConfig,
}

/// Which analysis service implementation to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceProvider {
    /// In-process service producing sample results after a fixed delay.
    #[default]
    Mock,
    /// Remote service reached over HTTP.
    Http,
}

impl std::fmt::Display for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceProvider::Mock => write!(f, "mock"),
            ServiceProvider::Http => write!(f, "http"),
        }
    }
}

/// Configuration for the analysis service client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub provider: ServiceProvider,
    /// Endpoint receiving `POST` analysis requests (http provider only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Bearer token sent with every request (http provider only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Simulated latency of the mock provider.
    pub mock_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            provider: ServiceProvider::Mock,
            endpoint: None,
            api_key: None,
            mock_delay_ms: 2_000,
        }
    }
}

/// Configuration for the request lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Upper bound on a single analysis call. Unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Configuration for score and factor presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Animate the score towards its value instead of showing it at once.
    pub animated: bool,
    /// Delay between animation steps.
    pub tick_interval_ms: u64,
    /// Render factor sections that have no items.
    pub show_empty_sections: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            animated: true,
            tick_interval_ms: 20,
            show_empty_sections: false,
        }
    }
}

impl FactShieldConfig {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.display.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "display.tick_interval_ms must be greater than zero".into(),
            });
        }
        if self.analysis.timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                message: "analysis.timeout_ms must be greater than zero when set".into(),
            });
        }
        if self.service.provider == ServiceProvider::Http {
            let endpoint = self
                .service
                .endpoint
                .as_deref()
                .ok_or_else(|| ConfigError::Invalid {
                    message: "service.endpoint is required for the http provider".into(),
                })?;
            url::Url::parse(endpoint).map_err(|e| ConfigError::Invalid {
                message: format!("service.endpoint '{endpoint}' is not a valid URL: {e}"),
            })?;
        }
        Ok(())
    }

    /// Render the configuration as TOML, e.g. for `factshield config show`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "factshield", "factshield")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".factshield").join("config.toml")
}

/// Individual settings that take precedence over every other layer.
///
/// Only the fields that are set are applied, so values coming from config
/// files and the environment survive an override of an unrelated field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub provider: Option<ServiceProvider>,
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
    pub animated: Option<bool>,
    pub tick_interval_ms: Option<u64>,
    pub show_empty_sections: Option<bool>,
}

impl ConfigOverrides {
    fn apply(&self, mut figment: Figment) -> Figment {
        if let Some(provider) = self.provider {
            figment = figment.merge(Serialized::default("service.provider", provider));
        }
        if let Some(endpoint) = &self.endpoint {
            figment = figment.merge(Serialized::default("service.endpoint", endpoint));
        }
        if let Some(timeout_ms) = self.timeout_ms {
            figment = figment.merge(Serialized::default("analysis.timeout_ms", timeout_ms));
        }
        if let Some(animated) = self.animated {
            figment = figment.merge(Serialized::default("display.animated", animated));
        }
        if let Some(tick_interval_ms) = self.tick_interval_ms {
            figment = figment.merge(Serialized::default("display.tick_interval_ms", tick_interval_ms));
        }
        if let Some(show) = self.show_empty_sections {
            figment = figment.merge(Serialized::default("display.show_empty_sections", show));
        }
        figment
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `FACTSHIELD_`)
/// 3. Workspace-local config (`.factshield/config.toml`)
/// 4. User config (`~/.config/factshield/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> Result<FactShieldConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(FactShieldConfig::default()));

    if let Some(user_config) = user_config_path().filter(|p| p.exists()) {
        figment = figment.merge(Toml::file(user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(ws_config));
        }
    }

    // FACTSHIELD_DISPLAY__ANIMATED, FACTSHIELD_ANALYSIS__TIMEOUT_MS, ...
    figment = figment.merge(Env::prefixed("FACTSHIELD_").split("__"));

    if let Some(overrides) = overrides {
        figment = overrides.apply(figment);
    }

    let config: FactShieldConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Check whether any FactShield configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// Write `config` to `<workspace>/.factshield/config.toml`, returning the path.
pub fn write_workspace_config(
    workspace: &Path,
    config: &FactShieldConfig,
) -> std::io::Result<PathBuf> {
    let path = workspace_config_path(workspace);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rendered = config
        .to_toml()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    std::fs::write(&path, rendered)?;
    Ok(path)
}
