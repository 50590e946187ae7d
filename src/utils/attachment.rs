//! Rules for recognizing attachment-shaped URLs and response hints.

use url::Url;

/// Extensions treated as attachments when no configuration overrides them.
pub const DEFAULT_ATTACHMENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".zip", ".rar", ".txt",
];

/// MIME fragments that mark a response as a downloadable document.
const MIME_HINTS: &[&str] = &[
    "pdf",
    "zip",
    "rar",
    "msword",
    "officedocument",
    "ms-excel",
];

/// Attachment recognition settings shared by every scanner and watch.
#[derive(Debug, Clone)]
pub struct AttachmentRules {
    extensions: Vec<String>,
    trusted_hosts: Vec<String>,
}

impl Default for AttachmentRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_ATTACHMENT_EXTENSIONS.iter().map(|s| s.to_string()),
            std::iter::empty::<String>(),
        )
    }
}

impl AttachmentRules {
    /// Extensions are normalized to lower case with a leading dot.
    pub fn new(
        extensions: impl IntoIterator<Item = impl Into<String>>,
        trusted_hosts: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| {
                let e = e.into().trim().to_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{}", e)
                }
            })
            .filter(|e| e.len() > 1)
            .collect();
        let trusted_hosts = trusted_hosts
            .into_iter()
            .map(|h| h.into().trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self {
            extensions,
            trusted_hosts,
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// True when the path part (query and fragment removed) ends with a known extension.
    pub fn is_attachment_shaped(&self, s: &str) -> bool {
        let lower = s.trim().to_lowercase();
        let path = lower
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        !path.is_empty() && self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    /// Mentions a known extension anywhere, e.g. in a link title.
    pub fn mentions_extension(&self, s: &str) -> bool {
        let lower = s.to_lowercase();
        self.extensions.iter().any(|ext| lower.contains(ext.as_str()))
    }

    /// Absolute http(s) URL that points at a file.
    pub fn is_absolute_attachment(&self, s: &str) -> bool {
        is_absolute_http(s) && self.is_attachment_shaped(s)
    }

    /// URL on a host configured as a known download endpoint.
    pub fn is_trusted_host(&self, s: &str) -> bool {
        if self.trusted_hosts.is_empty() {
            return false;
        }
        let Ok(url) = Url::parse(s) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        self.trusted_hosts.iter().any(|t| host.contains(t.as_str()))
    }

    /// Accepted as a download target from the network trace.
    pub fn is_download_target(&self, s: &str) -> bool {
        self.is_attachment_shaped(s) || self.is_trusted_host(s)
    }

    /// MIME type naming a document or archive format.
    pub fn mime_hint(mime: &str) -> bool {
        let mime = mime.to_lowercase();
        MIME_HINTS.iter().any(|h| mime.contains(h))
    }

    /// `Content-Disposition` asking the client to save the body.
    pub fn disposition_hint(header: &str) -> bool {
        header.to_lowercase().contains("attachment")
    }

    /// Regex alternation of the configured extensions, for raw-text searches.
    /// Longest first, so `.xlsx` is preferred over `.xls`.
    pub(crate) fn extension_pattern(&self) -> String {
        let mut extensions: Vec<&String> = self.extensions.iter().collect();
        extensions.sort_by_key(|e| std::cmp::Reverse(e.len()));
        extensions
            .into_iter()
            .map(|e| regex::escape(e))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Absolute http or https URL.
pub fn is_absolute_http(s: &str) -> bool {
    let lower = s.trim_start().to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
