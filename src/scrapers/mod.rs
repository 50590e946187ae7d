//! Page-facing components: the browser session, the download client and
//! the scanners that read attachment candidates off a loaded page.

pub mod browser;
pub mod direct_links;
pub mod frames;
pub mod http_client;
pub mod triggers;

pub use browser::{BrowserSession, ChromeLauncher, SessionError, SessionLauncher};
pub use direct_links::find_direct_links;
pub use frames::{scan_frames, CandidateFilter};
pub use http_client::{AttachmentClient, DownloadError};
pub use triggers::activate_popup_triggers;

/// CSS attribute-substring selector for elements whose click handler
/// mentions `function_name`.
pub(crate) fn onclick_selector(function_name: &str) -> String {
    let escaped = function_name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[onclick*=\"{}\"]", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onclick_selector_escapes_quotes() {
        assert_eq!(onclick_selector("opendown"), r#"[onclick*="opendown"]"#);
        assert_eq!(onclick_selector(r#"a"b"#), r#"[onclick*="a\"b"]"#);
    }
}
