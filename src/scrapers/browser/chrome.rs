//! Chromium session over the DevTools protocol.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::dom::{
    DescribeNodeParams, GetDocumentParams, QuerySelectorAllParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CreateIsolatedWorldParams, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
    NavigateParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserEngineConfig;

use super::scripts;
use super::{
    BrowserCookie, BrowserSession, ClickOutcome, ElementInfo, ElementRef, FrameRef,
    SessionError, SessionLauncher, TraceRecord, WindowHandle,
};

/// Name of the script world created inside frames the page cannot reach.
const ISOLATED_WORLD: &str = "attachd";

/// Flags every locally launched browser gets.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-popup-blocking",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    // Keeps cross-origin frames in the page's process so they can be scripted.
    "--disable-site-isolation-trials",
    "--disable-features=IsolateOrigins,site-per-process",
    "--no-first-run",
    "--no-default-browser-check",
];

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

impl From<CdpError> for SessionError {
    fn from(e: CdpError) -> Self {
        SessionError::Browser(e.to_string())
    }
}

/// Find Chrome executable.
fn find_chrome() -> Result<PathBuf, SessionError> {
    for path in CHROME_PATHS {
        let p = Path::new(path);
        if p.exists() {
            debug!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(path) = which::which(cmd) {
            debug!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
    }

    Err(SessionError::Launch(
        "Chrome/Chromium not found. Install it or set CHROME_BIN".into(),
    ))
}

/// Launches a fresh Chromium per task, or attaches to a remote one.
pub struct ChromeLauncher {
    config: BrowserEngineConfig,
    navigation_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(config: BrowserEngineConfig, navigation_timeout: Duration) -> Self {
        Self {
            config,
            navigation_timeout,
        }
    }

    async fn launch_local(&self, profile_dir: &Path) -> Result<Browser, SessionError> {
        info!("Launching browser (headless={})", self.config.headless);

        let chrome_path = match self.config.chrome_executable {
            Some(ref path) => path.clone(),
            None => find_chrome()?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(profile_dir)
            .window_size(self.config.window_width, self.config.window_height)
            .request_timeout(self.navigation_timeout);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| SessionError::Launch(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&self, url: &str) -> Result<Browser, SessionError> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| SessionError::Launch(format!("Failed to connect to remote browser: {}", e)))?
            .json()
            .await
            .map_err(|e| SessionError::Launch(format!("Failed to parse browser version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SessionError::Launch("No webSocketDebuggerUrl in response".into()))?;

        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: self.navigation_timeout,
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self, profile_dir: &Path) -> Result<Box<dyn BrowserSession>, SessionError> {
        let (browser, owned) = match self.config.remote_url {
            Some(ref url) => (self.connect_remote(url).await?, false),
            None => (self.launch_local(profile_dir).await?, true),
        };
        let session = ChromeSession::open(browser, owned, self.navigation_timeout).await?;
        Ok(Box::new(session))
    }
}

/// How scripts reach the frame the session has entered.
#[derive(Debug, Clone)]
enum FrameContext {
    /// Same-origin frame, reached through `contentDocument` from the top.
    Inline(usize),
    /// Cross-origin frame, scripted through an isolated world of its own.
    Isolated {
        index: usize,
        context: ExecutionContextId,
    },
}

impl FrameContext {
    fn index(&self) -> usize {
        match self {
            Self::Inline(index) | Self::Isolated { index, .. } => *index,
        }
    }
}

/// Script root and evaluation context for the entered frame.
///
/// Inside an isolated world `document` already is the frame's document.
fn script_target(frame: Option<&FrameContext>) -> (Option<usize>, Option<&ExecutionContextId>) {
    match frame {
        None => (None, None),
        Some(FrameContext::Inline(index)) => (Some(*index), None),
        Some(FrameContext::Isolated { context, .. }) => (None, Some(context)),
    }
}

/// Where to run the click script for `element_frame`.
///
/// Elements of the entered frame go through its context; anything else is
/// reached from the top document.
fn click_target(
    entered: Option<&FrameContext>,
    element_frame: Option<usize>,
) -> (Option<usize>, Option<&ExecutionContextId>) {
    match entered {
        Some(frame) if element_frame == Some(frame.index()) => script_target(Some(frame)),
        _ => (element_frame, None),
    }
}

/// One browser, one main window, with network and dialog listeners.
pub struct ChromeSession {
    browser: Browser,
    /// Launched by us, as opposed to a remote browser we only borrowed.
    owned: bool,
    page: Page,
    main: WindowHandle,
    frame: Option<FrameContext>,
    trace: Arc<Mutex<Vec<TraceRecord>>>,
    dialogs: Arc<Mutex<Vec<String>>>,
    listeners: Vec<JoinHandle<()>>,
    navigation_timeout: Duration,
    closed: bool,
}

#[derive(Deserialize)]
struct RawElement {
    id: String,
    #[serde(default)]
    text: String,
    href: Option<String>,
    title: Option<String>,
    onclick: Option<String>,
}

impl ChromeSession {
    async fn open(
        browser: Browser,
        owned: bool,
        navigation_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let page = browser.new_page("about:blank").await?;
        page.execute(EnableParams::default()).await?;

        let trace = Arc::new(Mutex::new(Vec::new()));
        let dialogs = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Vec::new();

        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let sink = trace.clone();
        listeners.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let headers = event
                    .response
                    .headers
                    .inner()
                    .as_object()
                    .map(|map| {
                        map.iter()
                            .map(|(k, v)| {
                                let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                                (k.clone(), v)
                            })
                            .collect::<BTreeMap<_, _>>()
                    })
                    .unwrap_or_default();
                let record = TraceRecord {
                    request_id: event.request_id.inner().clone(),
                    url: event.response.url.clone(),
                    mime_type: event.response.mime_type.clone(),
                    status: u16::try_from(event.response.status).unwrap_or_default(),
                    headers,
                };
                if let Ok(mut records) = sink.lock() {
                    records.push(record);
                }
            }
        }));

        let mut dialog_events = page.event_listener::<EventJavascriptDialogOpening>().await?;
        let sink = dialogs.clone();
        let dialog_page = page.clone();
        listeners.push(tokio::spawn(async move {
            while let Some(event) = dialog_events.next().await {
                info!("Dismissing dialog: {}", event.message);
                if let Ok(mut messages) = sink.lock() {
                    messages.push(event.message.clone());
                }
                if let Err(e) = dialog_page
                    .execute(HandleJavaScriptDialogParams::new(false))
                    .await
                {
                    warn!("Failed to dismiss dialog: {}", e);
                }
            }
        }));

        let main = WindowHandle(page.target_id().inner().clone());

        Ok(Self {
            browser,
            owned,
            page,
            main,
            frame: None,
            trace,
            dialogs,
            listeners,
            navigation_timeout,
            closed: false,
        })
    }

    fn dialog_count(&self) -> usize {
        self.dialogs.lock().map(|d| d.len()).unwrap_or_default()
    }

    fn dialogs_since(&self, start: usize) -> Option<String> {
        let dialogs = self.dialogs.lock().ok()?;
        let recent = dialogs.get(start..)?;
        if recent.is_empty() {
            None
        } else {
            Some(recent.join(" | "))
        }
    }

    /// Evaluate a script that returns a JSON string.
    async fn eval_json<T: DeserializeOwned>(&self, script: String) -> Result<T, SessionError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        let json: String = result
            .into_value()
            .map_err(|e| SessionError::Script(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| SessionError::Script(e.to_string()))
    }

    /// Evaluate a JSON-returning script in an isolated world, or in the main
    /// world when `context` is `None`.
    async fn eval_json_in<T: DeserializeOwned>(
        &self,
        script: String,
        context: Option<&ExecutionContextId>,
    ) -> Result<T, SessionError> {
        let Some(context) = context else {
            return self.eval_json(script).await;
        };
        let params = EvaluateParams::builder()
            .expression(script)
            .context_id(context.clone())
            .return_by_value(true)
            .build()
            .map_err(SessionError::Script)?;
        let response = self
            .page
            .execute(params)
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        if let Some(details) = &response.result.exception_details {
            return Err(SessionError::Script(details.text.clone()));
        }
        let json = response
            .result
            .result
            .value
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SessionError::Script("script returned no JSON".into()))?;
        serde_json::from_str(json).map_err(|e| SessionError::Script(e.to_string()))
    }

    fn target(&self) -> (Option<usize>, Option<&ExecutionContextId>) {
        script_target(self.frame.as_ref())
    }

    /// Isolated world inside the `index`-th iframe of the top document.
    async fn isolated_frame_context(&self, index: usize) -> Result<ExecutionContextId, SessionError> {
        let unavailable = || SessionError::FrameUnavailable(index);
        let document = self.page.execute(GetDocumentParams::default()).await?;
        let iframes = self
            .page
            .execute(QuerySelectorAllParams::new(
                document.result.root.node_id.clone(),
                "iframe",
            ))
            .await?;
        let node_id = iframes
            .result
            .node_ids
            .get(index)
            .cloned()
            .ok_or_else(unavailable)?;
        let described = self
            .page
            .execute(DescribeNodeParams::builder().node_id(node_id).build())
            .await?;
        let frame_id = described
            .result
            .node
            .frame_id
            .clone()
            .ok_or_else(unavailable)?;
        let params = CreateIsolatedWorldParams::builder()
            .frame_id(frame_id)
            .world_name(ISOLATED_WORLD)
            .build()
            .map_err(SessionError::Script)?;
        let world = self.page.execute(params).await?;
        Ok(world.result.execution_context_id.clone())
    }

    async fn wait_for_page_ready(&self) {
        match tokio::time::timeout(
            self.navigation_timeout,
            self.page.evaluate(scripts::WAIT_FOR_READY_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => {
                debug!("Could not check ready state (possibly non-HTML page): {}", e);
            }
            Err(_) => {
                warn!("Timeout waiting for page ready state");
            }
        }
    }

    async fn find_window(&self, handle: &WindowHandle) -> Result<Page, SessionError> {
        let pages = self.browser.pages().await?;
        pages
            .into_iter()
            .find(|p| p.target_id().inner() == &handle.0)
            .ok_or_else(|| SessionError::WindowUnavailable(handle.0.clone()))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        info!("Navigating to {}", url);
        self.frame = None;
        let dialogs_before = self.dialog_count();

        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                reason: e,
            })?;

        match tokio::time::timeout(self.navigation_timeout, self.page.execute(params)).await {
            Err(_) => {
                return Err(SessionError::NavigationTimeout {
                    url: url.to_string(),
                    secs: self.navigation_timeout.as_secs(),
                })
            }
            Ok(Err(e)) => {
                return Err(SessionError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(Ok(response)) => {
                if let Some(reason) = response.result.error_text.clone() {
                    return Err(SessionError::Navigation {
                        url: url.to_string(),
                        reason,
                    });
                }
            }
        }

        self.wait_for_page_ready().await;

        match self.dialogs_since(dialogs_before) {
            Some(message) => Err(SessionError::UnexpectedDialog(message)),
            None => Ok(()),
        }
    }

    async fn current_url(&mut self) -> Result<String, SessionError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&mut self) -> Result<String, SessionError> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn page_source(&mut self) -> Result<String, SessionError> {
        let (root, context) = self.target();
        let html: Option<String> = self
            .eval_json_in(scripts::page_source(root), context)
            .await?;
        match (html, &self.frame) {
            (Some(html), _) => Ok(html),
            (None, Some(frame)) => Err(SessionError::FrameUnavailable(frame.index())),
            (None, None) => Ok(String::new()),
        }
    }

    async fn enumerate_frames(&mut self) -> Result<Vec<FrameRef>, SessionError> {
        self.eval_json(scripts::ENUMERATE_FRAMES_SCRIPT.to_string())
            .await
    }

    async fn enter_frame(&mut self, frame: &FrameRef) -> Result<(), SessionError> {
        let accessible: bool = self.eval_json(scripts::frame_accessible(frame.index)).await?;
        if accessible {
            self.frame = Some(FrameContext::Inline(frame.index));
            return Ok(());
        }

        let context = self
            .isolated_frame_context(frame.index)
            .await
            .map_err(|e| {
                debug!("Frame {} has no usable context: {}", frame.index, e);
                SessionError::FrameUnavailable(frame.index)
            })?;
        debug!("Entered cross-origin frame {} through an isolated world", frame.index);
        self.frame = Some(FrameContext::Isolated {
            index: frame.index,
            context,
        });
        Ok(())
    }

    async fn default_content(&mut self) -> Result<(), SessionError> {
        self.frame = None;
        Ok(())
    }

    async fn query(&mut self, selector: &str) -> Result<Vec<ElementInfo>, SessionError> {
        let frame = self.frame.as_ref().map(FrameContext::index);
        let (root, context) = self.target();
        let raw: Option<Vec<RawElement>> = self
            .eval_json_in(scripts::query(root, selector), context)
            .await?;
        let raw = match (raw, frame) {
            (Some(raw), _) => raw,
            (None, Some(i)) => return Err(SessionError::FrameUnavailable(i)),
            (None, None) => Vec::new(),
        };
        Ok(raw
            .into_iter()
            .map(|r| ElementInfo {
                element: ElementRef { frame, id: r.id },
                text: r.text,
                href: r.href,
                title: r.title,
                onclick: r.onclick,
            })
            .collect())
    }

    async fn click(&mut self, element: &ElementRef) -> Result<ClickOutcome, SessionError> {
        let dialogs_before = self.dialog_count();
        let (root, context) = click_target(self.frame.as_ref(), element.frame);
        let status: String = self
            .eval_json_in(scripts::click(root, &element.id), context)
            .await?;
        match status.as_str() {
            "frame" => return Err(SessionError::FrameUnavailable(element.frame.unwrap_or_default())),
            "detached" => return Err(SessionError::ElementDetached(element.to_string())),
            _ => {}
        }
        Ok(ClickOutcome {
            dialog: self.dialogs_since(dialogs_before),
        })
    }

    async fn container_html(
        &mut self,
        container_id: &str,
    ) -> Result<Option<String>, SessionError> {
        let (root, context) = self.target();
        let html: Option<String> = self
            .eval_json_in(scripts::container_html(root, container_id), context)
            .await?;
        match (html, context) {
            // An isolated world only sees its frame; fall back to the top document.
            (None, Some(_)) => {
                self.eval_json(scripts::container_html(None, container_id))
                    .await
            }
            (html, _) => Ok(html),
        }
    }

    async fn window_handles(&mut self) -> Result<BTreeSet<WindowHandle>, SessionError> {
        let pages = self.browser.pages().await?;
        Ok(pages
            .iter()
            .map(|p| WindowHandle(p.target_id().inner().clone()))
            .collect())
    }

    async fn window_url(&mut self, handle: &WindowHandle) -> Result<String, SessionError> {
        let page = self.find_window(handle).await?;
        page.bring_to_front().await?;
        Ok(page.url().await?.unwrap_or_default())
    }

    async fn close_window(&mut self, handle: &WindowHandle) -> Result<(), SessionError> {
        if *handle == self.main {
            return Err(SessionError::WindowUnavailable(handle.0.clone()));
        }
        let closed = match self.find_window(handle).await {
            Ok(page) => page.close().await.map_err(SessionError::from),
            Err(e) => Err(e),
        };
        self.page.bring_to_front().await?;
        closed
    }

    async fn network_trace(&mut self) -> Result<Vec<TraceRecord>, SessionError> {
        self.trace
            .lock()
            .map(|records| records.clone())
            .map_err(|e| SessionError::Browser(e.to_string()))
    }

    async fn fetch_response_body(&mut self, request_id: &str) -> Result<String, SessionError> {
        let unavailable = || SessionError::BodyUnavailable(request_id.to_string());
        let response = self
            .page
            .execute(GetResponseBodyParams::new(RequestId::new(request_id)))
            .await
            .map_err(|_| unavailable())?;
        let body = &response.result;
        if body.base64_encoded {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(body.body.as_bytes())
                .map_err(|_| unavailable())?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(body.body.clone())
        }
    }

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, SessionError> {
        let cookies = self.page.get_cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|c| BrowserCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect())
    }

    async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
        if self.owned {
            if let Err(e) = self.browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }
        } else if let Err(e) = self.page.clone().close().await {
            warn!("Failed to close remote page: {}", e);
        }
        debug!("Browser session closed");
    }
}
