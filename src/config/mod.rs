//! Configuration management.
//!
//! A config file is discovered with `prefer` (attachd.toml, attachd.yaml,
//! attachd.json in the usual locations) or given explicitly with
//! `--config`. Every field is optional; unset fields keep the defaults in
//! [`Settings`].

mod browser;
mod loader;
mod settings;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use browser::BrowserEngineConfig;
pub use loader::{load_settings_with_options, LoadOptions};
pub use settings::{Settings, StoreSettings, Timing, DEFAULT_USER_AGENT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },
}

/// Configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Parent directory for per-task working directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Download timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_timeout: Option<u64>,
    /// Navigation timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_invalid_certs: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_extensions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_download_hosts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup_trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_title_len: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,

    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    pub async fn load() -> Self {
        match prefer::load("attachd").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}; using defaults", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the file extension; anything unknown is read as JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_error = |format: &'static str, message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            format,
            message,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_error("TOML", e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_error("YAML", e.to_string()))?
            }
            _ => serde_json::from_str(&contents).map_err(|e| parse_error("JSON", e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, used for relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are joined onto `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref work_dir) = self.work_dir {
            settings.work_dir = self.resolve_path(work_dir, base_dir);
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.download_timeout {
            settings.download_timeout = timeout;
        }
        if let Some(timeout) = self.navigation_timeout {
            settings.navigation_timeout = timeout;
        }
        if let Some(accept) = self.accept_invalid_certs {
            settings.accept_invalid_certs = accept;
        }
        if let Some(ref exts) = self.attachment_extensions {
            settings.attachment_extensions = exts.clone();
        }
        if let Some(ref hosts) = self.trusted_download_hosts {
            settings.trusted_download_hosts = hosts.clone();
        }
        if let Some(ref trigger) = self.popup_trigger {
            settings.popup_trigger = trigger.clone();
        }
        if let Some(ref trigger) = self.validation_trigger {
            settings.validation_trigger = trigger.clone();
        }
        if let Some(ref selector) = self.title_selector {
            settings.title_selector = selector.clone();
        }
        if let Some(len) = self.short_title_len {
            settings.short_title_len = len;
        }
        if let Some(ref timing) = self.timing {
            settings.timing = timing.clone();
        }
        if let Some(ref store) = self.store {
            settings.store = store.clone();
        }
        if let Some(ref browser) = self.browser {
            let mut browser = browser.clone();
            if let Some(ref exe) = browser.chrome_executable {
                browser.chrome_executable =
                    Some(self.resolve_path(&exe.to_string_lossy(), base_dir));
            }
            settings.browser = browser;
        }
    }
}
