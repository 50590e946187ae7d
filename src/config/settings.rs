//! Application settings.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::{AttachmentRules, DEFAULT_ATTACHMENT_EXTENSIONS};

use super::BrowserEngineConfig;

/// Default user agent for attachment downloads.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (AttachmentBot/1.0)";

/// Fully resolved runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Parent of the per-task working directories.
    pub work_dir: PathBuf,
    /// User agent for file downloads.
    pub user_agent: String,
    /// Download timeout in seconds.
    pub download_timeout: u64,
    /// Page navigation ceiling in seconds.
    pub navigation_timeout: u64,
    /// Accept self-signed and otherwise invalid TLS certificates.
    pub accept_invalid_certs: bool,
    /// Extensions that mark a URL as an attachment.
    pub attachment_extensions: Vec<String>,
    /// Host fragments whose URLs count as downloads even without an extension.
    pub trusted_download_hosts: Vec<String>,
    /// Script function that opens the attachment popup.
    pub popup_trigger: String,
    /// Script function that gates a download behind validation.
    pub validation_trigger: String,
    /// Selector for the page heading used in upload names.
    pub title_selector: String,
    /// Characters of the heading kept in upload names.
    pub short_title_len: usize,
    pub timing: Timing,
    pub store: StoreSettings,
    pub browser: BrowserEngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let work_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("attachd")
            .join("work");

        Self {
            work_dir,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            download_timeout: 60,
            navigation_timeout: 60,
            accept_invalid_certs: true,
            attachment_extensions: DEFAULT_ATTACHMENT_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trusted_download_hosts: Vec::new(),
            popup_trigger: "opendown".to_string(),
            validation_trigger: "GetValidateCode".to_string(),
            title_selector: "h3".to_string(),
            short_title_len: 15,
            timing: Timing::default(),
            store: StoreSettings::default(),
            browser: BrowserEngineConfig::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom work directory.
    pub fn with_work_dir(work_dir: PathBuf) -> Self {
        Self {
            work_dir,
            ..Default::default()
        }
    }

    pub fn attachment_rules(&self) -> AttachmentRules {
        AttachmentRules::new(
            self.attachment_extensions.iter().cloned(),
            self.trusted_download_hosts.iter().cloned(),
        )
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout)
    }

    /// Apply environment variable overrides.
    ///
    /// - `ATTACHD_STORE_URL` - knowledge store base URL
    /// - `ATTACHD_KNOWLEDGE_BASE_ID` - target knowledge base
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("ATTACHD_STORE_URL") {
            if !val.is_empty() {
                self.store.base_url = val;
            }
        }
        if let Ok(val) = std::env::var("ATTACHD_KNOWLEDGE_BASE_ID") {
            match val.parse() {
                Ok(id) => self.store.knowledge_base_id = id,
                Err(_) => tracing::warn!("Ignoring invalid ATTACHD_KNOWLEDGE_BASE_ID: {}", val),
            }
        }
        self.browser = self.browser.with_env_overrides();
        self
    }
}

/// Waits and polling ceilings used while resolving attachments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Pause after navigation before reading the page.
    pub page_settle_ms: u64,
    /// Pause after each popup trigger click.
    pub trigger_pause_ms: u64,
    /// Ceiling for a new window to appear after a click.
    pub window_wait_secs: u64,
    pub window_poll_ms: u64,
    /// Pause after a new window appears before reading its URL.
    pub window_settle_ms: u64,
    /// Number of network trace polls after a click.
    pub trace_polls: u32,
    pub trace_poll_ms: u64,
    /// Pause between candidates.
    pub candidate_pause_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            page_settle_ms: 1000,
            trigger_pause_ms: 400,
            window_wait_secs: 8,
            window_poll_ms: 300,
            window_settle_ms: 600,
            trace_polls: 6,
            trace_poll_ms: 800,
            candidate_pause_ms: 300,
        }
    }
}

impl Timing {
    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }

    pub fn trigger_pause(&self) -> Duration {
        Duration::from_millis(self.trigger_pause_ms)
    }

    pub fn window_wait(&self) -> Duration {
        Duration::from_secs(self.window_wait_secs)
    }

    pub fn window_poll(&self) -> Duration {
        Duration::from_millis(self.window_poll_ms)
    }

    pub fn window_settle(&self) -> Duration {
        Duration::from_millis(self.window_settle_ms)
    }

    pub fn trace_poll(&self) -> Duration {
        Duration::from_millis(self.trace_poll_ms)
    }

    pub fn candidate_pause(&self) -> Duration {
        Duration::from_millis(self.candidate_pause_ms)
    }
}

/// Knowledge store upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub base_url: String,
    pub knowledge_base_id: u64,
    /// Upload timeout in seconds.
    pub upload_timeout: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3001".to_string(),
            knowledge_base_id: 254,
            upload_timeout: 120,
        }
    }
}

impl StoreSettings {
    pub fn upload_endpoint(&self) -> String {
        format!(
            "{}/api/v2/filelib/file/{}",
            self.base_url.trim_end_matches('/'),
            self.knowledge_base_id
        )
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_endpoint_trims_trailing_slash() {
        let store = StoreSettings {
            base_url: "http://10.0.0.5:3001/".to_string(),
            knowledge_base_id: 12,
            upload_timeout: 120,
        };
        assert_eq!(store.upload_endpoint(), "http://10.0.0.5:3001/api/v2/filelib/file/12");
    }

    #[test]
    fn test_partial_timing_keeps_defaults() {
        let timing: Timing = toml::from_str("trace_polls = 3").unwrap();
        assert_eq!(timing.trace_polls, 3);
        assert_eq!(timing.window_wait_secs, 8);
    }
}
