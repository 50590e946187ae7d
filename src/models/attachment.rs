//! Attachment candidates and resolution results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scrapers::browser::ElementRef;

/// Which strategy surfaced a resolved URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveredVia {
    /// The element's own href already pointed at a file.
    DirectHref,
    /// Clicking opened a window whose URL is the file.
    NewWindow,
    /// A captured network response carried the file URL.
    NetworkTrace,
    /// Page script wrote a link into a named container.
    DomContainer,
    /// Static scan of the top-level page.
    StaticScan,
}

impl DiscoveredVia {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectHref => "direct_href",
            Self::NewWindow => "new_window",
            Self::NetworkTrace => "network_trace",
            Self::DomContainer => "dom_container",
            Self::StaticScan => "static_scan",
        }
    }
}

impl std::fmt::Display for DiscoveredVia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An element that might lead to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentCandidate {
    pub display_label: String,
    pub raw_href: Option<String>,
    pub click_handler_text: Option<String>,
    /// Container id named in the validation handler, e.g. `box1` in
    /// `GetValidateCode('box1')`.
    pub container_id: Option<String>,
    pub element: ElementRef,
}

/// A fetchable URL produced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAttachment {
    pub url: String,
    pub discovered_via: DiscoveredVia,
}

impl ResolvedAttachment {
    pub fn new(url: impl Into<String>, discovered_via: DiscoveredVia) -> Self {
        Self {
            url: url.into(),
            discovered_via,
        }
    }
}

/// A file materialized in the task's work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub local_path: PathBuf,
    pub origin_url: String,
    pub original_name: String,
}
