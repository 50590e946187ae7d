//! Settings resolution: file config, then environment, then CLI overrides.

use std::path::PathBuf;

use super::{Config, ConfigError, Settings};

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Work directory override (--work-dir flag).
    pub work_dir: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
///
/// An explicit config path that cannot be read is an error; a discovered
/// one that fails to parse falls back to defaults with a warning.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    let mut settings = settings.with_env_overrides();

    if let Some(work_dir) = options.work_dir {
        settings.work_dir = work_dir;
    }

    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cli_work_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attachd.json");
        std::fs::write(&path, r#"{"work_dir": "from-file", "title_selector": "h1"}"#).unwrap();

        let (settings, config) = load_settings_with_options(LoadOptions {
            config_path: Some(path.clone()),
            work_dir: Some(PathBuf::from("/tmp/attachd-cli")),
        })
        .await
        .unwrap();

        assert_eq!(config.source_path, Some(path));
        assert_eq!(settings.work_dir, PathBuf::from("/tmp/attachd-cli"));
        assert_eq!(settings.title_selector, "h1");
    }

    #[tokio::test]
    async fn test_missing_explicit_config_is_error() {
        let result = load_settings_with_options(LoadOptions {
            config_path: Some(PathBuf::from("/nonexistent/attachd.toml")),
            work_dir: None,
        })
        .await;
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
