//! Browser session abstraction.
//!
//! One session per task. Everything the resolver needs from a browser goes
//! through [`BrowserSession`]; the chromiumoxide implementation lives in
//! `chrome` behind the `browser` feature.

mod types;

#[cfg(feature = "browser")]
mod chrome;
#[cfg(feature = "browser")]
mod scripts;

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use types::{
    BrowserCookie, ClickOutcome, ElementInfo, ElementRef, FrameRef, TraceRecord, WindowHandle,
};

#[cfg(feature = "browser")]
pub use chrome::{ChromeLauncher, ChromeSession};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("navigation to {url} timed out after {secs}s")]
    NavigationTimeout { url: String, secs: u64 },
    #[error("unexpected dialog: {0}")]
    UnexpectedDialog(String),
    #[error("frame {0} is not accessible")]
    FrameUnavailable(usize),
    #[error("element {0} is no longer attached")]
    ElementDetached(String),
    #[error("response body unavailable for request {0}")]
    BodyUnavailable(String),
    #[error("window {0} is not available")]
    WindowUnavailable(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("browser error: {0}")]
    Browser(String),
}

impl SessionError {
    /// Errors that end the task instead of a single watch.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::Navigation { .. } | Self::NavigationTimeout { .. } | Self::UnexpectedDialog(_)
        )
    }
}

/// A live browser with one main window.
///
/// Queries, clicks and container lookups act on the current context: the
/// top document, or the frame last entered with [`enter_frame`].
///
/// [`enter_frame`]: BrowserSession::enter_frame
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url` in the main window and wait for the document to be ready.
    /// Resets the context to the top document.
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    async fn current_url(&mut self) -> Result<String, SessionError>;

    /// Document title of the main window.
    async fn title(&mut self) -> Result<String, SessionError>;

    /// Markup of the current context.
    async fn page_source(&mut self) -> Result<String, SessionError>;

    /// Frames of the top document, including ones without a `src`.
    async fn enumerate_frames(&mut self) -> Result<Vec<FrameRef>, SessionError>;

    async fn enter_frame(&mut self, frame: &FrameRef) -> Result<(), SessionError>;

    /// Return to the top document.
    async fn default_content(&mut self) -> Result<(), SessionError>;

    /// Elements matching a CSS selector in the current context.
    async fn query(&mut self, selector: &str) -> Result<Vec<ElementInfo>, SessionError>;

    /// Script-level click. A dialog raised by the click is dismissed and
    /// reported in the outcome.
    async fn click(&mut self, element: &ElementRef) -> Result<ClickOutcome, SessionError>;

    /// Inner markup of the element with id `container_id`, if present.
    async fn container_html(&mut self, container_id: &str)
        -> Result<Option<String>, SessionError>;

    /// Snapshot of the open windows.
    async fn window_handles(&mut self) -> Result<BTreeSet<WindowHandle>, SessionError>;

    /// Focus `handle` and read its URL.
    async fn window_url(&mut self, handle: &WindowHandle) -> Result<String, SessionError>;

    /// Close `handle` and return focus to the main window.
    async fn close_window(&mut self, handle: &WindowHandle) -> Result<(), SessionError>;

    /// Every response captured since the session started, oldest first.
    async fn network_trace(&mut self) -> Result<Vec<TraceRecord>, SessionError>;

    /// Decoded body of a captured response.
    async fn fetch_response_body(&mut self, request_id: &str) -> Result<String, SessionError>;

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, SessionError>;

    /// Release the browser. Safe to call more than once.
    async fn shutdown(&mut self);
}

/// Creates one session per task.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// `profile_dir` is a scratch directory owned by the task.
    async fn launch(&self, profile_dir: &Path) -> Result<Box<dyn BrowserSession>, SessionError>;
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromeLauncher;

#[cfg(not(feature = "browser"))]
impl ChromeLauncher {
    pub fn new(_config: crate::config::BrowserEngineConfig, _navigation_timeout: std::time::Duration) -> Self {
        Self
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self, _profile_dir: &Path) -> Result<Box<dyn BrowserSession>, SessionError> {
        Err(SessionError::Launch(
            "Browser support not compiled. Rebuild with: cargo build --features browser".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_errors_are_task_fatal() {
        assert!(SessionError::NavigationTimeout {
            url: "http://site".into(),
            secs: 60
        }
        .is_navigation());
        assert!(SessionError::UnexpectedDialog("login required".into()).is_navigation());
        assert!(!SessionError::BodyUnavailable("17.3".into()).is_navigation());
        assert!(!SessionError::FrameUnavailable(2).is_navigation());
    }
}
