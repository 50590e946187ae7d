//! Scripted browser session and recording knowledge store for driving the
//! orchestrator without a real browser.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use attachd::config::{Settings, Timing};
use attachd::scrapers::browser::{
    BrowserCookie, BrowserSession, ClickOutcome, ElementInfo, ElementRef, FrameRef, SessionError,
    SessionLauncher, TraceRecord, WindowHandle,
};
use attachd::services::{KnowledgeStore, UploadError};

const MAIN_WINDOW: &str = "main";

/// What a click changes on the page.
#[derive(Debug, Clone, Default)]
pub struct ClickEffect {
    pub dialog: Option<String>,
    pub open_window: Option<String>,
    /// Responses that arrive after the click, with their bodies.
    pub responses: Vec<(TraceRecord, Option<String>)>,
    /// Container id and the markup written into it.
    pub container: Option<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeLink {
    pub text: String,
    pub href: Option<String>,
    pub title: Option<String>,
    pub onclick: Option<String>,
    pub effect: ClickEffect,
}

impl FakeLink {
    pub fn validation(container: &str) -> Self {
        Self {
            text: "Attachment".into(),
            href: Some("javascript:void(0)".into()),
            onclick: Some(format!("GetValidateCode('{}')", container)),
            ..Default::default()
        }
    }

    pub fn href(text: &str, href: &str) -> Self {
        Self {
            text: text.into(),
            href: Some(href.into()),
            ..Default::default()
        }
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.effect = effect;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeFrame {
    pub src: Option<String>,
    /// Cross-origin frames cannot be entered.
    pub inaccessible: bool,
    pub links: Vec<FakeLink>,
}

/// The page every launched session shows.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub heading: Option<String>,
    pub document_title: String,
    pub popup_triggers: usize,
    pub frames: Vec<FakeFrame>,
    pub source: String,
    pub navigation_error: Option<String>,
    pub cookies: Vec<BrowserCookie>,
}

/// Everything the sessions were asked to do, shared with the test.
#[derive(Debug, Default)]
pub struct SessionLog {
    pub launches: Vec<PathBuf>,
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub closed_windows: Vec<String>,
    pub shutdowns: usize,
}

pub struct FakeLauncher {
    page: FakePage,
    pub log: Arc<Mutex<SessionLog>>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            log: Arc::new(Mutex::new(SessionLog::default())),
        }
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self, profile_dir: &Path) -> Result<Box<dyn BrowserSession>, SessionError> {
        self.log.lock().unwrap().launches.push(profile_dir.to_path_buf());
        Ok(Box::new(FakeSession {
            page: self.page.clone(),
            log: self.log.clone(),
            url: String::new(),
            frame: None,
            windows: HashMap::new(),
            trace: Vec::new(),
            bodies: HashMap::new(),
            containers: HashMap::new(),
        }))
    }
}

pub struct FakeSession {
    page: FakePage,
    log: Arc<Mutex<SessionLog>>,
    url: String,
    frame: Option<usize>,
    windows: HashMap<String, String>,
    trace: Vec<TraceRecord>,
    bodies: HashMap<String, String>,
    containers: HashMap<String, String>,
}

impl FakeSession {
    fn link(&self, element: &ElementRef) -> Option<&FakeLink> {
        let frame = self.page.frames.get(element.frame?)?;
        let index: usize = element.id.strip_prefix("link-")?.parse().ok()?;
        frame.links.get(index)
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        if let Some(reason) = &self.page.navigation_error {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }
        self.url = url.to_string();
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, SessionError> {
        Ok(self.url.clone())
    }

    async fn title(&mut self) -> Result<String, SessionError> {
        Ok(self.page.document_title.clone())
    }

    async fn page_source(&mut self) -> Result<String, SessionError> {
        Ok(self.page.source.clone())
    }

    async fn enumerate_frames(&mut self) -> Result<Vec<FrameRef>, SessionError> {
        Ok(self
            .page
            .frames
            .iter()
            .enumerate()
            .map(|(index, f)| FrameRef {
                index,
                src: f.src.clone(),
            })
            .collect())
    }

    async fn enter_frame(&mut self, frame: &FrameRef) -> Result<(), SessionError> {
        match self.page.frames.get(frame.index) {
            Some(f) if !f.inaccessible => {
                self.frame = Some(frame.index);
                Ok(())
            }
            _ => Err(SessionError::FrameUnavailable(frame.index)),
        }
    }

    async fn default_content(&mut self) -> Result<(), SessionError> {
        self.frame = None;
        Ok(())
    }

    async fn query(&mut self, selector: &str) -> Result<Vec<ElementInfo>, SessionError> {
        match (self.frame, selector) {
            (None, "h3") => Ok(self
                .page
                .heading
                .iter()
                .map(|text| ElementInfo {
                    element: ElementRef {
                        frame: None,
                        id: "heading".into(),
                    },
                    text: text.clone(),
                    href: None,
                    title: None,
                    onclick: None,
                })
                .collect()),
            (None, s) if s.starts_with("[onclick*=") => Ok((0..self.page.popup_triggers)
                .map(|i| ElementInfo {
                    element: ElementRef {
                        frame: None,
                        id: format!("trigger-{}", i),
                    },
                    text: "Attachments".into(),
                    href: None,
                    title: None,
                    onclick: Some("opendown()".into()),
                })
                .collect()),
            (Some(index), "a") => Ok(self.page.frames[index]
                .links
                .iter()
                .enumerate()
                .map(|(i, link)| ElementInfo {
                    element: ElementRef {
                        frame: Some(index),
                        id: format!("link-{}", i),
                    },
                    text: link.text.clone(),
                    href: link.href.clone(),
                    title: link.title.clone(),
                    onclick: link.onclick.clone(),
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn click(&mut self, element: &ElementRef) -> Result<ClickOutcome, SessionError> {
        self.log.lock().unwrap().clicks.push(element.to_string());
        if element.frame.is_none() {
            return Ok(ClickOutcome::default());
        }
        if self.frame != element.frame {
            return Err(SessionError::ElementDetached(element.to_string()));
        }
        let effect = self
            .link(element)
            .map(|l| l.effect.clone())
            .ok_or_else(|| SessionError::ElementDetached(element.to_string()))?;

        if let Some(url) = effect.open_window {
            let handle = format!("popup-{}", self.windows.len());
            self.windows.insert(handle, url);
        }
        for (record, body) in effect.responses {
            if let Some(body) = body {
                self.bodies.insert(record.request_id.clone(), body);
            }
            self.trace.push(record);
        }
        if let Some((id, html)) = effect.container {
            self.containers.insert(id, html);
        }
        Ok(ClickOutcome {
            dialog: effect.dialog,
        })
    }

    async fn container_html(&mut self, container_id: &str) -> Result<Option<String>, SessionError> {
        Ok(self.containers.get(container_id).cloned())
    }

    async fn window_handles(&mut self) -> Result<BTreeSet<WindowHandle>, SessionError> {
        let mut handles: BTreeSet<WindowHandle> =
            self.windows.keys().cloned().map(WindowHandle).collect();
        handles.insert(WindowHandle(MAIN_WINDOW.into()));
        Ok(handles)
    }

    async fn window_url(&mut self, handle: &WindowHandle) -> Result<String, SessionError> {
        self.windows
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| SessionError::WindowUnavailable(handle.0.clone()))
    }

    async fn close_window(&mut self, handle: &WindowHandle) -> Result<(), SessionError> {
        self.windows.remove(&handle.0);
        self.log.lock().unwrap().closed_windows.push(handle.0.clone());
        Ok(())
    }

    async fn network_trace(&mut self) -> Result<Vec<TraceRecord>, SessionError> {
        Ok(self.trace.clone())
    }

    async fn fetch_response_body(&mut self, request_id: &str) -> Result<String, SessionError> {
        self.bodies
            .get(request_id)
            .cloned()
            .ok_or_else(|| SessionError::BodyUnavailable(request_id.to_string()))
    }

    async fn cookies(&mut self) -> Result<Vec<BrowserCookie>, SessionError> {
        Ok(self.page.cookies.clone())
    }

    async fn shutdown(&mut self) {
        self.log.lock().unwrap().shutdowns += 1;
    }
}

/// A JSON response captured in the trace.
pub fn json_response(request_id: &str, url: &str, body: &str) -> (TraceRecord, Option<String>) {
    (
        TraceRecord {
            request_id: request_id.into(),
            url: url.into(),
            mime_type: "application/json".into(),
            status: 200,
            headers: Default::default(),
        },
        Some(body.into()),
    )
}

/// Knowledge store that keeps every upload name and file body.
#[derive(Default)]
pub struct RecordingStore {
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingStore {
    pub fn names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl KnowledgeStore for RecordingStore {
    async fn upload(&self, path: &Path, upload_name: &str) -> Result<u16, UploadError> {
        let body = tokio::fs::read(path).await?;
        self.uploads
            .lock()
            .unwrap()
            .push((upload_name.to_string(), body));
        Ok(200)
    }
}

/// Settings with every wait shortened for tests.
pub fn fast_settings(work_dir: &Path) -> Settings {
    let mut settings = Settings::with_work_dir(work_dir.to_path_buf());
    settings.download_timeout = 10;
    settings.timing = Timing {
        page_settle_ms: 0,
        trigger_pause_ms: 0,
        window_wait_secs: 0,
        window_poll_ms: 10,
        window_settle_ms: 0,
        trace_polls: 2,
        trace_poll_ms: 10,
        candidate_pause_ms: 0,
    };
    settings
}
