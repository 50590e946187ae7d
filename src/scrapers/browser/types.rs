//! Values exchanged with a browser session.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to an element found by a query.
///
/// Stays valid until the page navigates or the element leaves the DOM.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    /// Frame the element lives in, `None` for the top document.
    pub frame: Option<usize>,
    pub id: String,
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frame {
            Some(i) => write!(f, "frame{}/{}", i, self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// Attributes of a queried element.
#[derive(Debug, Clone)]
pub struct ElementInfo {
    pub element: ElementRef,
    pub text: String,
    pub href: Option<String>,
    pub title: Option<String>,
    pub onclick: Option<String>,
}

/// An embedded frame of the top document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRef {
    pub index: usize,
    #[serde(default)]
    pub src: Option<String>,
}

/// Identifier of an open browser window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowHandle(pub String);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response metadata captured by network instrumentation.
#[derive(Debug, Clone, Default)]
pub struct TraceRecord {
    pub request_id: String,
    pub url: String,
    pub mime_type: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

impl TraceRecord {
    /// Header lookup, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What happened while a click was dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickOutcome {
    /// Message of a modal dialog raised by the click, already dismissed.
    pub dialog: Option<String>,
}

/// Cookie extracted from browser session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}
