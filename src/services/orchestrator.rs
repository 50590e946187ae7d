//! Per-task sequencing.
//!
//! One browser session and one working directory per task. The working
//! directory is wiped when a task starts, never when it ends, so the files
//! of a failed run stay around until the same id runs again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::narrative::Narrative;
use super::pipeline::{UploadNaming, UploadPipeline};
use super::resolver::Resolver;
use super::upload::{HttpKnowledgeStore, KnowledgeStore};
use crate::config::Settings;
use crate::models::{BatchReport, DiscoveredVia, DownloadedFile, Task, TaskResult, TaskStatus};
use crate::scrapers::browser::{BrowserSession, SessionError, SessionLauncher};
use crate::scrapers::{
    activate_popup_triggers, find_direct_links, scan_frames, AttachmentClient, CandidateFilter,
    ChromeLauncher,
};
use crate::utils::{short_title, task_dir_name};

/// Browser profile directory inside a task's working directory.
const PROFILE_DIR: &str = "_profile";

/// Failures that end a task with status `Error`.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("could not prepare working directory {path}: {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not build download client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct TaskOrchestrator {
    settings: Settings,
    launcher: Arc<dyn SessionLauncher>,
    store: Arc<dyn KnowledgeStore>,
}

impl TaskOrchestrator {
    pub fn new(
        settings: Settings,
        launcher: Arc<dyn SessionLauncher>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            settings,
            launcher,
            store,
        }
    }

    /// Chromium sessions and the HTTP knowledge store, as configured.
    pub fn from_settings(settings: Settings) -> Result<Self, reqwest::Error> {
        let launcher = ChromeLauncher::new(settings.browser.clone(), settings.navigation_timeout());
        let store = HttpKnowledgeStore::new(&settings.store, settings.accept_invalid_certs)?;
        Ok(Self::new(settings, Arc::new(launcher), Arc::new(store)))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Working directory of a task id.
    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.settings.work_dir.join(task_dir_name(task_id))
    }

    /// Run tasks one after another.
    pub async fn run_batch(&self, tasks: &[Task]) -> BatchReport {
        let mut details = Vec::with_capacity(tasks.len());
        for task in tasks {
            details.push(self.run(task).await);
        }
        BatchReport::new(details)
    }

    /// Run one task. Always returns a result; failures are reported inside it.
    pub async fn run(&self, task: &Task) -> TaskResult {
        let started_at = Utc::now();
        let mut narrative = Narrative::new(&task.id);
        narrative.push(format!("--- Task {} accepted: {} ---", task.id, task.source_url));

        let outcome = self.run_with_session(task, &mut narrative).await;

        let (status, uploaded, error) = match outcome {
            Ok(Some(uploaded)) => {
                narrative.push(format!(
                    "--- Task {} finished: uploaded {} file(s) ---",
                    task.id,
                    uploaded.len()
                ));
                (TaskStatus::Success, uploaded, None)
            }
            Ok(None) => {
                narrative.push(format!("Task {}: no attachments found", task.id));
                (TaskStatus::NoContent, Vec::new(), None)
            }
            Err(e) => {
                error!(task = %task.id, "Task failed: {}", e);
                narrative.push(format!("!!! Task failed: {}", e));
                (TaskStatus::Error, Vec::new(), Some(e.to_string()))
            }
        };

        TaskResult {
            task_id: task.id.clone(),
            url: task.source_url.clone(),
            status,
            uploaded_file_names: uploaded,
            messages: narrative.into_messages(),
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// `Ok(None)` when no file could be downloaded.
    async fn run_with_session(
        &self,
        task: &Task,
        narrative: &mut Narrative,
    ) -> Result<Option<Vec<String>>, TaskError> {
        let work_dir = self.task_dir(&task.id);
        prepare_work_dir(&work_dir).await?;
        narrative.push(format!("Working directory: {}", work_dir.display()));

        let mut session = self.launcher.launch(&work_dir.join(PROFILE_DIR)).await?;
        narrative.push("Browser started");

        let result = self
            .drive(session.as_mut(), task, &work_dir, narrative)
            .await;

        session.shutdown().await;
        result
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        task: &Task,
        work_dir: &Path,
        narrative: &mut Narrative,
    ) -> Result<Option<Vec<String>>, TaskError> {
        let settings = &self.settings;

        session.navigate(&task.source_url).await?;
        tokio::time::sleep(settings.timing.page_settle()).await;

        let title = page_title(session, &settings.title_selector).await;
        let short = short_title(&title, settings.short_title_len);
        narrative.push(format!("Page title (short): {}", short));

        let cookies = session.cookies().await.unwrap_or_else(|e| {
            warn!("Could not read browser cookies: {}", e);
            Vec::new()
        });
        let client = AttachmentClient::from_cookies(&cookies, settings)?;
        let rules = settings.attachment_rules();

        narrative.push("Validation path: popup triggers and iframes");
        activate_popup_triggers(
            session,
            &settings.popup_trigger,
            settings.timing.trigger_pause(),
            narrative,
        )
        .await;

        let filter = CandidateFilter::new(rules.clone(), &settings.validation_trigger);
        let candidates = scan_frames(session, &filter, narrative).await;

        let resolver = Resolver::new(&client, &rules, &settings.timing, work_dir);
        let mut files: Vec<DownloadedFile> = Vec::new();
        for (i, candidate) in candidates.iter().enumerate() {
            narrative.push(format!(
                "  Candidate {}: '{}'",
                i + 1,
                candidate.display_label
            ));
            if let Some(resolution) = resolver.resolve(session, candidate, narrative).await {
                files.push(resolution.file);
            }
        }
        narrative.push(format!("Validation path downloaded {} file(s)", files.len()));

        if files.is_empty() {
            narrative.push("Falling back to direct links on the page");
            files = self.direct_links(session, &client, work_dir, narrative).await;
            narrative.push(format!("Direct links downloaded {} file(s)", files.len()));
        } else {
            narrative.push("Skipping direct links");
        }

        if files.is_empty() {
            return Ok(None);
        }

        let naming = UploadNaming::new(&task.id, &short);
        let pipeline = UploadPipeline::new(self.store.as_ref());
        let mut uploaded = Vec::new();
        for file in &files {
            uploaded.extend(pipeline.process(file, &naming, narrative).await);
        }
        info!(task = %task.id, "Uploaded {} of {} file(s)", uploaded.len(), files.len());

        Ok(Some(uploaded))
    }

    async fn direct_links(
        &self,
        session: &mut dyn BrowserSession,
        client: &AttachmentClient,
        work_dir: &Path,
        narrative: &mut Narrative,
    ) -> Vec<DownloadedFile> {
        let _ = session.default_content().await;
        let page_url = session.current_url().await.unwrap_or_default();
        let html = match session.page_source().await {
            Ok(html) => html,
            Err(e) => {
                narrative.push(format!("  Could not read page source: {}", e));
                return Vec::new();
            }
        };

        let links = find_direct_links(&html, &page_url, &self.settings.attachment_rules());
        narrative.push(format!("  {} direct link candidate(s)", links.len()));

        let mut files = Vec::new();
        for url in links {
            match client.download(&url, work_dir, None).await {
                Ok(file) => {
                    narrative.push(format!(
                        "    Downloaded {} ({})",
                        file.original_name,
                        DiscoveredVia::StaticScan
                    ));
                    files.push(file);
                }
                Err(e) => narrative.push(format!("    {}", e)),
            }
        }
        files
    }
}

async fn prepare_work_dir(work_dir: &Path) -> Result<(), TaskError> {
    let to_err = |source: std::io::Error| TaskError::WorkDir {
        path: work_dir.to_path_buf(),
        source,
    };
    if tokio::fs::try_exists(work_dir).await.map_err(to_err)? {
        tokio::fs::remove_dir_all(work_dir).await.map_err(to_err)?;
    }
    tokio::fs::create_dir_all(work_dir).await.map_err(to_err)
}

/// First non-empty heading, else the document title.
async fn page_title(session: &mut dyn BrowserSession, selector: &str) -> String {
    if let Ok(headings) = session.query(selector).await {
        if let Some(text) = headings
            .into_iter()
            .map(|h| h.text.trim().to_string())
            .find(|t| !t.is_empty())
        {
            return text;
        }
    }
    session.title().await.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_work_dir_wipes_previous_run() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("7");
        std::fs::create_dir_all(dir.join("_extracted_x")).unwrap();
        std::fs::write(dir.join("stale.pdf"), b"old").unwrap();

        prepare_work_dir(&dir).await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }
}
