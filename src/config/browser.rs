//! Browser engine configuration types.
//!
//! These live outside the `browser` feature gate so config parsing works
//! in builds without chromiumoxide.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome/Chromium executable. Auto-detected when unset.
    /// Can also be set via CHROME_BIN environment variable.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    /// Can also be set via BROWSER_URL environment variable.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_executable: None,
            remote_url: None,
            proxy: None,
            chrome_args: Vec::new(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `CHROME_BIN` - Chrome executable path
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BROWSER_URL") {
            if !val.is_empty() {
                self.remote_url = Some(val);
            }
        }
        if let Ok(val) = std::env::var("CHROME_BIN") {
            if !val.is_empty() {
                self.chrome_executable = Some(PathBuf::from(val));
            }
        }
        self
    }
}

pub fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1366
}

fn default_window_height() -> u32 {
    900
}
